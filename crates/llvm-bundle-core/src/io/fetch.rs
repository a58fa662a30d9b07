//! Streaming HTTP fetch of upstream archives and license files.
//!
//! Caching is the caller's job (see [`crate::cache::ArchiveCache`]); a
//! fetch always goes to the network.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};

use crate::paths::filename_from_url;

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

fn initial_capacity(content_length: Option<u64>) -> usize {
    let capped = content_length.unwrap_or(0).min(MAX_PREALLOCATION);
    usize::try_from(capped).unwrap_or(0)
}

#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered 404: this resource does not exist.
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// Timeouts, connection resets, 5xx and any other non-404 failure.
    #[error("Fetching {url} failed: {reason}")]
    Transient { url: String, reason: String },
}

impl FetchError {
    fn transient(url: &str, reason: impl ToString) -> Self {
        Self::Transient {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Retrieves a named remote resource.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` completely into memory.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`Fetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!("downloading {}", filename_from_url(url));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transient(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::transient(url, format!("HTTP {status}")));
        }

        let total_size = response.content_length();
        let mut body = Vec::with_capacity(initial_capacity(total_size));
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::transient(url, e))?;
            body.extend_from_slice(&chunk);
        }

        if let Some(expected) = total_size {
            if body.len() as u64 != expected {
                return Err(FetchError::transient(
                    url,
                    format!("truncated body: {} of {expected} bytes", body.len()),
                ));
            }
        }

        debug!(url, bytes = body.len(), "download complete");
        Ok(body)
    }
}
