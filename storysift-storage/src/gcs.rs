//! Google Cloud Storage client over the JSON API.
//!
//! Only the three operations the pipeline needs: media upload, `alt=media`
//! download, and a metadata probe for existence. Requests retry on 429/5xx
//! and transport faults with exponential backoff; logs carry the auth kind
//! but never the token.

use crate::{BlobStore, StorageError};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

const DEFAULT_BASE: &str = "https://storage.googleapis.com/";

pub struct GcsStore {
    inner: Client,
    base: Url,
    bucket: String,
    token: Option<String>,
    max_retries: usize,
}

impl GcsStore {
    pub fn new(bucket: impl Into<String>, token: Option<String>) -> Result<Self, StorageError> {
        Self::with_base(DEFAULT_BASE, bucket, token)
    }

    /// Point the client at a different endpoint (emulators in tests).
    pub fn with_base(
        base: &str,
        bucket: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, StorageError> {
        let base = Url::parse(base).map_err(|e| StorageError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            base,
            bucket: bucket.into(),
            token,
            max_retries: 2,
        })
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    fn object_url(&self, path: &str, media: bool) -> Result<Url, StorageError> {
        let mut url = self
            .base
            .join(&format!(
                "storage/v1/b/{}/o/{}",
                self.bucket,
                encode_object(path)
            ))
            .map_err(|e| StorageError::Url(e.to_string()))?;
        if media {
            url.query_pairs_mut().append_pair("alt", "media");
        }
        Ok(url)
    }

    fn upload_url(&self, path: &str) -> Result<Url, StorageError> {
        let mut url = self
            .base
            .join(&format!("upload/storage/v1/b/{}/o", self.bucket))
            .map_err(|e| StorageError::Url(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", path);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, StorageError> {
        let mut attempt = 0usize;
        loop {
            let mut rb = self.inner.request(method.clone(), url.clone());
            if let Some(token) = &self.token {
                rb = rb.bearer_auth(token);
            }
            if let Some(bytes) = &body {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(bytes.clone());
            }

            tracing::debug!(
                target: "storage.gcs",
                attempt = attempt + 1,
                method = %method,
                host_path = %format!("{}{}", url.domain().unwrap_or("-"), url.path()),
                auth_kind = if self.token.is_some() { "bearer" } else { "none" },
                "gcs.request.start"
            );

            let result = rb.send().await;
            let retriable = match &result {
                Ok(resp) => {
                    let status = resp.status();
                    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                }
                Err(_) => true,
            };

            if retriable && attempt < self.max_retries {
                attempt += 1;
                let delay = Duration::from_millis(200u64.saturating_mul(1 << (attempt - 1)));
                tracing::warn!(
                    target: "storage.gcs",
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    "gcs.retrying"
                );
                sleep(delay).await;
                continue;
            }

            return result.map_err(|e| StorageError::Network(e.to_string()));
        }
    }
}

#[async_trait]
impl BlobStore for GcsStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let url = self.upload_url(path)?;
        let resp = self.send(Method::POST, url, Some(bytes.to_vec())).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        tracing::info!(
            target: "storage.gcs",
            bucket = %self.bucket,
            object = path,
            size = bytes.len(),
            "object uploaded"
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(path, true)?;
        let resp = self.send(Method::GET, url, None).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let url = self.object_url(path, false)?;
        let resp = self.send(Method::GET, url, None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(api_error(resp).await),
        }
    }
}

async fn api_error(resp: reqwest::Response) -> StorageError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    let mut message = message.trim().to_string();
    message.truncate(512);
    StorageError::Api { status, message }
}

/// Percent-encode an object name for use as a single URL path segment.
/// GCS requires slashes inside object names to be encoded.
fn encode_object(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
