//! Object stores holding the published workbooks.
//!
//! Two backends share the `ObjectStore` seam: a local directory tree laid out
//! like the bucket, and an S3-compatible HTTP endpoint listed with
//! ListObjectsV2.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

use crate::error::SourceError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key under `prefix`, in the order the store returns them.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, SourceError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, SourceError>;

    /// Human-readable location of a key, for logs and run metadata.
    fn location(&self, key: &str) -> String;
}

// =============================================================================
// Local directory
// =============================================================================

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        let dir = self.path(prefix);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %dir.display(), "source directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(SourceError::io(dir.display().to_string(), e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::io(dir.display().to_string(), e))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                keys.push(format!("{}{}", prefix, entry.file_name().to_string_lossy()));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.path(key);
        fs::read(&path)
            .await
            .map_err(|e| SourceError::io(path.display().to_string(), e))
    }

    fn location(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

// =============================================================================
// S3-compatible HTTP endpoint
// =============================================================================

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default, PartialEq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum ListField {
    Key,
    IsTruncated,
    NextToken,
}

pub fn parse_listing(xml: &str) -> Result<ListPage, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut keys = Vec::new();
    let mut truncated = false;
    let mut token = None;
    let mut field = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                field = match e.name().as_ref() {
                    b"Key" => Some(ListField::Key),
                    b"IsTruncated" => Some(ListField::IsTruncated),
                    b"NextContinuationToken" => Some(ListField::NextToken),
                    _ => None,
                };
                text.clear();
            }
            Ok(Event::Text(ref e)) if field.is_some() => {
                let value = e
                    .unescape()
                    .map_err(|err| SourceError::Listing(err.to_string()))?;
                text.push_str(&value);
            }
            Ok(Event::End(_)) => {
                match field.take() {
                    Some(ListField::Key) => keys.push(std::mem::take(&mut text)),
                    Some(ListField::IsTruncated) => truncated = text.trim() == "true",
                    Some(ListField::NextToken) => token = Some(std::mem::take(&mut text)),
                    None => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Listing(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(ListPage {
        keys,
        next_token: if truncated { token } else { None },
    })
}

pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, token: Option<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("FinanzasLoader/1.0 (reportes trimestrales LDF)")
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token,
        })
    }

    fn bucket_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        let url = self.bucket_url();
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2".to_string()), ("prefix", prefix.to_string())];
            if let Some(t) = &token {
                query.push(("continuation-token", t.clone()));
            }

            let resp = self.request(&url).query(&query).send().await?;
            if !resp.status().is_success() {
                return Err(SourceError::Status {
                    key: prefix.to_string(),
                    status: resp.status().as_u16(),
                });
            }
            let page = parse_listing(&resp.text().await?)?;
            tracing::debug!(prefix, page_keys = page.keys.len(), "listed object page");
            keys.extend(page.keys);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, SourceError> {
        let resp = self.request(&self.location(key)).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status {
                key: key.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    fn location(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_url(), key)
    }
}
