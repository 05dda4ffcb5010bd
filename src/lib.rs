//! # contract-qna
//!
//! Question answering over land-lease agreements.
//!
//! This library provides:
//! - A generator that asks Gemini for synthetic lease agreements, renders
//!   them to PDF and uploads them to Cloud Storage
//! - A document agent that works out which agreement a question refers to,
//!   asks for clarification when that is ambiguous, and answers from the
//!   chosen document
//! - An HTTP API and an interactive console over the agent
//!
//! ## Architecture
//!
//! Every user turn runs to completion:
//! 1. List the reference set from the artifact store
//! 2. Ask the model which document the question means
//! 3. Load it, ask for a clarification, or report that nothing matched
//! 4. Answer with the loaded document in context
//!
//! ## Example
//!
//! ```rust,ignore
//! use contract_qna::agent::{AgentDefinition, DocumentAgent, Session, UserMessage};
//! use contract_qna::config::Config;
//!
//! let config = Config::from_env()?;
//! let agent = DocumentAgent::from_config(&config, AgentDefinition::multi_document())?;
//! let mut session = Session::new();
//! let reply = agent
//!     .handle_turn(&mut session, UserMessage::text("What is the rent for plot 12?"))
//!     .await?;
//! ```

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod console;
pub mod generator;
pub mod llm;
pub mod storage;

pub use config::Config;
