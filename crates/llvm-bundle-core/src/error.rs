//! Run-level error taxonomy.
//!
//! Component errors fold into [`PipelineError`]; only
//! [`PipelineError::NotFound`] is recovered from (the platform is skipped),
//! everything else ends the run.

use std::io;

use llvm_bundle_schema::ConfigError;
use thiserror::Error;

use crate::bundle::BundleError;
use crate::install_tree::TargetError;
use crate::io::extract::ExtractError;
use crate::io::fetch::FetchError;
use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Not found: {url}")]
    NotFound { url: String },

    #[error("Transient failure: {0}")]
    Transient(String),

    /// The platform table, the upstream layout or the credentials are wrong.
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("{operation} rejected ({status}): {message}")]
    RegistryRejected {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected registry response: {0}")]
    UnexpectedResponse(String),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Giving up on {operation} after {retries} retries: {last}")]
    RetriesExhausted {
        operation: String,
        retries: u32,
        last: String,
    },
}

impl PipelineError {
    /// Whether the failure came from the network or a 5xx.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether this error means "no build for this platform".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound { url } => Self::NotFound { url },
            err @ FetchError::Transient { .. } => Self::Transient(err.to_string()),
        }
    }
}

impl From<BundleError> for PipelineError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::Io(e) => Self::Io(e),
            err => Self::ConfigurationMismatch(err.to_string()),
        }
    }
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        match err {
            err @ RegistryError::Transient { .. } => Self::Transient(err.to_string()),
            RegistryError::Rejected {
                operation,
                status,
                message,
            } => Self::RegistryRejected {
                operation,
                status,
                message,
            },
            err @ RegistryError::Decode { .. } => Self::UnexpectedResponse(err.to_string()),
            RegistryError::Io(e) => Self::Io(e),
            RegistryError::RetriesExhausted {
                operation,
                retries,
                last,
            } => Self::RetriesExhausted {
                operation,
                retries,
                last: last.to_string(),
            },
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigurationMismatch(err.to_string())
    }
}

impl From<TargetError> for PipelineError {
    fn from(err: TargetError) -> Self {
        Self::ConfigurationMismatch(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(io::Error::other(err))
    }
}
