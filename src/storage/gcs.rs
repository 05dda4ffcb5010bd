//! Google Cloud Storage backend over the JSON API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{mime_for_name, validate_name, Artifact, ArtifactInfo, ArtifactStore, StorageError};

const API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Objects under `gs://{bucket}/{prefix}/`.
#[derive(Clone)]
pub struct GcsStore {
    client: Client,
    bucket: String,
    prefix: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    /// The API encodes sizes as decimal strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    name: &'a str,
    content_type: &'a str,
    #[serde(skip_serializing_if = "no_metadata")]
    metadata: &'a BTreeMap<String, String>,
}

fn no_metadata(metadata: &&BTreeMap<String, String>) -> bool {
    metadata.is_empty()
}

impl GcsStore {
    pub fn new(
        bucket: &str,
        prefix: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    /// Full object key for an artifact name.
    fn object_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    /// Artifact name for an object key, `None` for keys outside the prefix.
    fn artifact_name<'a>(&self, object: &'a str) -> Option<&'a str> {
        let name = if self.prefix.is_empty() {
            object
        } else {
            object.strip_prefix(&self.prefix)?.strip_prefix('/')?
        };
        // "Directory" placeholder objects end with a slash.
        (!name.is_empty() && !name.ends_with('/')).then_some(name)
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/b/{}/o/{}",
            API_BASE,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(&self.object_name(name))
        )
    }

    async fn get_resource(&self, name: &str) -> Result<Option<ObjectResource>, StorageError> {
        let response = self
            .client
            .get(self.object_url(name))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        Ok(Some(response.json().await?))
    }
}

/// Turn a non-success response into `StorageError::Api`.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Fresh `multipart/related` boundary for one upload.
fn new_boundary() -> String {
    format!("contract_qna_{}", uuid::Uuid::new_v4().simple())
}

/// `multipart/related` body: JSON resource followed by the media.
fn multipart_body(
    boundary: &str,
    metadata: &UploadMetadata<'_>,
    data: &[u8],
) -> Result<Vec<u8>, StorageError> {
    let json =
        serde_json::to_string(metadata).map_err(|e| StorageError::Metadata(e.to_string()))?;
    let mut body = Vec::with_capacity(json.len() + data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n--{boundary}\r\nContent-Type: {}\r\n\r\n",
            metadata.content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}

#[async_trait]
impl ArtifactStore for GcsStore {
    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.prefix)
    }

    async fn list(&self) -> Result<Vec<ArtifactInfo>, StorageError> {
        let url = format!("{}/b/{}/o", API_BASE, urlencoding::encode(&self.bucket));
        let list_prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };

        let mut infos = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("prefix", list_prefix.clone())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await?;
            let page: ObjectList = check(response).await?.json().await?;

            for item in page.items {
                let Some(name) = self.artifact_name(&item.name) else {
                    continue;
                };
                infos.push(ArtifactInfo {
                    name: name.to_string(),
                    mime_type: item
                        .content_type
                        .unwrap_or_else(|| mime_for_name(name).to_string()),
                    size: item.size.and_then(|s| s.parse().ok()).unwrap_or(0),
                    metadata: item.metadata,
                    updated_at: item.updated,
                });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        infos.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!("Listed {} objects in {}", infos.len(), self.describe());
        Ok(infos)
    }

    async fn load(&self, name: &str) -> Result<Option<Artifact>, StorageError> {
        validate_name(name)?;
        let Some(resource) = self.get_resource(name).await? else {
            return Ok(None);
        };

        let response = self
            .client
            .get(self.object_url(name))
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let data = check(response).await?.bytes().await?;

        Ok(Some(Artifact {
            name: name.to_string(),
            mime_type: resource
                .content_type
                .unwrap_or_else(|| mime_for_name(name).to_string()),
            data,
            metadata: resource.metadata,
            updated_at: resource.updated,
        }))
    }

    async fn save(&self, artifact: &Artifact) -> Result<(), StorageError> {
        validate_name(&artifact.name)?;
        let object_name = self.object_name(&artifact.name);
        let metadata = UploadMetadata {
            name: &object_name,
            content_type: &artifact.mime_type,
            metadata: &artifact.metadata,
        };
        let boundary = new_boundary();
        let body = multipart_body(&boundary, &metadata, &artifact.data)?;

        let url = format!("{}/b/{}/o", UPLOAD_BASE, urlencoding::encode(&self.bucket));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        check(response).await?;

        tracing::info!("Uploaded gs://{}/{}", self.bucket, object_name);
        Ok(())
    }
}
