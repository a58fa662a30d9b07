//! llvm-bundle core: fetching upstream LLVM packages, cutting them into
//! small deterministic bundles and publishing those to release registries.

pub mod bundle;
pub mod cache;
pub mod error;
pub mod install_tree;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod publish;
pub mod registry;
pub mod retry;

pub use bundle::{BundleBuilder, BundleError, BundleResult};
pub use cache::ArchiveCache;
pub use error::PipelineError;
pub use io::extract::{ExtractError, Extractor};
pub use io::fetch::{FetchError, Fetcher, HttpFetcher};
pub use pipeline::{ChecksumReport, Pipeline};
pub use publish::ReleasePublisher;
pub use registry::{
    Credentials, NewRelease, RegistryError, ReleaseRegistry, RemoteAsset, RemoteRelease,
};
pub use retry::RetryPolicy;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("llvm-bundle/", env!("CARGO_PKG_VERSION"));
