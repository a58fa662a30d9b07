//! Remote release registries.
//!
//! [`ReleaseRegistry`] is the seam the publisher drives; [`github`] talks to
//! the GitHub Releases API and [`package_host`] to the generic package host
//! used for install-tree bundles.

pub mod github;
pub mod package_host;

use std::path::Path;

use async_trait::async_trait;
use llvm_bundle_schema::ReleaseVersion;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Network failure or 5xx; another attempt may succeed.
    #[error("{operation} failed: {reason}")]
    Transient { operation: String, reason: String },

    /// The registry refused the request. `message` is the registry's own.
    #[error("{operation} failed with status {status}: {message}")]
    Rejected {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("{operation} returned an unexpected response: {reason}")]
    Decode { operation: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} still failing after {retries} retries: {last}")]
    RetriesExhausted {
        operation: String,
        retries: u32,
        last: Box<RegistryError>,
    },
}

impl RegistryError {
    pub(crate) fn transient(operation: &str, reason: impl ToString) -> Self {
        Self::Transient {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(operation: &str, reason: impl ToString) -> Self {
        Self::Decode {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify a `reqwest` error raised while sending or reading.
    pub(crate) fn from_reqwest(operation: &str, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::decode(operation, err)
        } else {
            Self::transient(operation, err)
        }
    }
}

impl Retryable for RegistryError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    fn exhausted(self, operation: &str, retries: u32) -> Self {
        Self::RetriesExhausted {
            operation: operation.to_string(),
            retries,
            last: Box::new(self),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pass `response` through if its status is `expected`.
///
/// 5xx becomes [`RegistryError::Transient`]; anything else unexpected becomes
/// [`RegistryError::Rejected`] carrying the JSON `message` field, or the raw
/// body when there is none.
pub(crate) async fn expect_status(
    operation: &str,
    response: Response,
    expected: StatusCode,
) -> Result<Response, RegistryError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    if status.is_server_error() {
        return Err(RegistryError::transient(operation, format!("HTTP {status}")));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    Err(RegistryError::Rejected {
        operation: operation.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// Username and API token for a registry.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteAsset {
    pub id: u64,
    pub name: String,
}

/// A release as the registry reports it right now.
///
/// Always fetched fresh; it is the source of truth for whether an asset
/// already exists.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRelease {
    pub id: u64,
    #[serde(rename = "tag_name")]
    pub tag: String,
    pub upload_url: String,
    #[serde(default)]
    pub assets: Vec<RemoteAsset>,
}

impl RemoteRelease {
    pub fn asset(&self, name: &str) -> Option<&RemoteAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Metadata for a release that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    #[serde(rename = "tag_name")]
    pub tag: String,
    pub name: String,
    pub body: String,
    pub prerelease: bool,
}

impl NewRelease {
    pub fn for_version(version: &ReleaseVersion) -> Self {
        let tag = version.tag();
        Self {
            name: format!("LLVM {tag}"),
            body: format!("Prebuilt libclang and clangd bundles for LLVM {tag}."),
            prerelease: version.is_prerelease(),
            tag,
        }
    }
}

/// A registry that groups named assets under tagged releases.
#[async_trait]
pub trait ReleaseRegistry: Send + Sync {
    /// Look up the release tagged `tag`, if any.
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, RegistryError>;

    async fn create_release(&self, release: &NewRelease) -> Result<RemoteRelease, RegistryError>;

    async fn delete_asset(&self, asset: &RemoteAsset) -> Result<(), RegistryError>;

    /// Attach the file at `path` to `release` as `name`, streaming its bytes.
    async fn upload_asset(
        &self,
        release: &RemoteRelease,
        name: &str,
        content_type: &str,
        path: &Path,
    ) -> Result<RemoteAsset, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_metadata_for_candidate() {
        let version = ReleaseVersion::parse("10.0.0rc2").unwrap();
        let release = NewRelease::for_version(&version);
        assert_eq!(release.tag, "10.0.0rc2");
        assert_eq!(release.name, "LLVM 10.0.0rc2");
        assert!(release.prerelease);

        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(json["tag_name"], "10.0.0rc2");
    }

    #[test]
    fn test_final_release_is_not_prerelease() {
        let version = ReleaseVersion::parse("10.0.0").unwrap();
        let release = NewRelease::for_version(&version);
        assert!(!release.prerelease);
        assert_eq!(
            release.body,
            "Prebuilt libclang and clangd bundles for LLVM 10.0.0."
        );
    }

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(RegistryError::transient("list releases", "timeout").is_transient());
        let rejected = RegistryError::Rejected {
            operation: "create release".into(),
            status: 422,
            message: "Validation Failed".into(),
        };
        assert!(!rejected.is_transient());
        let exhausted = RegistryError::transient("list releases", "reset").exhausted("list", 3);
        assert!(!exhausted.is_transient());
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let creds = Credentials {
            username: "bot".into(),
            token: "ghp_secret".into(),
        };
        assert!(!format!("{creds:?}").contains("ghp_secret"));
    }
}
