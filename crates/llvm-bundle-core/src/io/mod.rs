//! IO modules - side effects (network, filesystem, subprocess)

pub mod extract;
pub mod fetch;

use std::path::Path;
use std::time::Duration;

use reqwest::{Body, Client};
use tokio_util::io::ReaderStream;

/// Build the HTTP client shared by fetches and registry calls.
///
/// Only the connection phase is bounded; multi-hundred-MB downloads must
/// not be cut off by a whole-request timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(crate::USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()
}

/// Open `path` as a streamed request body, returning it with its length.
pub(crate) async fn file_body(path: &Path) -> std::io::Result<(Body, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    Ok((Body::wrap_stream(ReaderStream::new(file)), len))
}
