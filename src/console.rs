//! Interactive console for `contract-qna chat`.
//!
//! Each input line is one user turn. Lines starting with `/` are console
//! commands:
//!
//! - `/docs` - list the documents the agent can see
//! - `/upload <path>` - attach a local file (saved as an artifact)
//! - `/quit` - leave the session

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::agent::{Attachment, DocumentAgent, Session, UserMessage};
use crate::storage::mime_for_name;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Ask(String),
    ListDocuments,
    Upload(PathBuf),
    Quit,
    Help,
    Empty,
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Ask(line.to_string());
        };
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));
        match name {
            "docs" | "documents" => Self::ListDocuments,
            "upload" if !arg.is_empty() => Self::Upload(PathBuf::from(arg)),
            "quit" | "exit" => Self::Quit,
            _ => Self::Help,
        }
    }
}

const HELP: &str = "Commands: /docs, /upload <path>, /quit. Anything else is a question.";

/// Run the console until `/quit` or end of input.
pub async fn run<R, W>(agent: &DocumentAgent, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session::new();
    tracing::debug!(session = %session.id, "Console session started");

    output
        .write_all(
            format!(
                "{} ({:?}): {} Using {}. {}\n",
                agent.definition().name,
                agent.definition().variant,
                agent.definition().description,
                agent.store().describe(),
                HELP
            )
            .as_bytes(),
        )
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let message = match ConsoleInput::parse(&line) {
            ConsoleInput::Empty => continue,
            ConsoleInput::Quit => break,
            ConsoleInput::Help => {
                output.write_all(format!("{}\n", HELP).as_bytes()).await?;
                continue;
            }
            ConsoleInput::ListDocuments => {
                let text = match agent.store().names().await {
                    Ok(names) if names.is_empty() => "No documents.".to_string(),
                    Ok(names) => names.join("\n"),
                    Err(e) => format!("Error: {}", e),
                };
                output.write_all(format!("{}\n", text).as_bytes()).await?;
                continue;
            }
            ConsoleInput::Upload(path) => match read_attachment(&path).await {
                Ok(attachment) => UserMessage::default().with_attachment(attachment),
                Err(e) => {
                    output
                        .write_all(format!("Error: {}: {}\n", path.display(), e).as_bytes())
                        .await?;
                    continue;
                }
            },
            ConsoleInput::Ask(text) => UserMessage::text(text),
        };

        let text = match agent.handle_turn(&mut session, message).await {
            Ok(reply) => format!("Agent: {}\n", reply.text),
            Err(e) => {
                tracing::warn!(session = %session.id, "Turn failed: {}", e);
                format!("Error: {}\n", e)
            }
        };
        output.write_all(text.as_bytes()).await?;
    }

    output.flush().await
}

async fn read_attachment(path: &Path) -> std::io::Result<Attachment> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Attachment {
        mime_type: Some(mime_for_name(&name).to_string()),
        name,
        data: data.into(),
    })
}
