//! llvm-bundle - package prebuilt LLVM releases into small bundles
//!
//! Two workflows:
//!
//! - `bundle`: download the upstream prebuilt packages for each platform,
//!   cut `libclang` and `clangd` bundles out of them and attach those to a
//!   GitHub release.
//! - `install-tree`: package an already-built LLVM install directory and
//!   publish it to the package host.

pub mod cmd;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use llvm_bundle_core::{Credentials, PipelineError};
use llvm_bundle_schema::ReleaseVersion;

/// Command line of the `llvm-bundle` binary.
#[derive(Debug, Parser)]
#[command(name = "llvm-bundle")]
#[command(author, version, about = "Package prebuilt LLVM releases into libclang and clangd bundles")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bundle upstream prebuilt packages and publish them as release assets
    Bundle(BundleArgs),
    /// Bundle a local LLVM install tree and publish it to the package host
    InstallTree(InstallTreeArgs),
}

/// Version selection shared by both subcommands.
#[derive(Debug, Args)]
pub struct VersionArgs {
    /// LLVM version, e.g. 10.0.0
    pub version: ReleaseVersion,

    /// Release candidate number; makes the tag `<version>rc<n>`
    #[arg(long)]
    pub release_candidate: Option<u32>,
}

impl VersionArgs {
    /// The effective release version.
    pub fn resolve(&self) -> ReleaseVersion {
        match self.release_candidate {
            Some(rc) => self.version.clone().with_release_candidate(Some(rc)),
            None => self.version.clone(),
        }
    }
}

/// Arguments of `llvm-bundle bundle`.
#[derive(Debug, Args)]
pub struct BundleArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub version: VersionArgs,

    /// Only process these platforms (repeatable)
    #[arg(long = "only", value_name = "PLATFORM")]
    pub only: Vec<String>,

    /// Platform table to use instead of the built-in one
    #[arg(long, value_name = "FILE")]
    pub platforms: Option<PathBuf>,

    /// Keep bundles in this directory (default: a temporary directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for downloaded upstream archives
    #[arg(long, conflicts_with = "no_cache")]
    pub cache_dir: Option<PathBuf>,

    /// Always download, never read or write the archive cache
    #[arg(long)]
    pub no_cache: bool,

    /// Build bundles without publishing them
    #[arg(long)]
    pub no_upload: bool,

    /// Keep extraction directories for inspection
    #[arg(long)]
    pub keep_temp: bool,

    /// GitHub organization owning the release repository
    #[arg(long, default_value = "ycm-core")]
    pub org: String,

    /// Release repository name
    #[arg(long, default_value = "llvm")]
    pub repo: String,

    /// GitHub user name
    #[arg(long = "gh-user", env = "GITHUB_USERNAME")]
    pub gh_user: Option<String>,

    /// GitHub API token
    #[arg(long = "gh-token", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub gh_token: Option<String>,
}

impl BundleArgs {
    /// GitHub credentials, required unless `--no-upload` is given.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigurationMismatch`] if either value is missing.
    pub fn credentials(&self) -> Result<Credentials, PipelineError> {
        credentials(
            self.gh_user.as_deref(),
            self.gh_token.as_deref(),
            "--gh-user/--gh-token or GITHUB_USERNAME/GITHUB_TOKEN",
        )
    }
}

/// Arguments of `llvm-bundle install-tree`.
#[derive(Debug, Args)]
pub struct InstallTreeArgs {
    /// LLVM install directory (the build's install prefix)
    pub install_dir: PathBuf,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub version: VersionArgs,

    /// Target triple; detected from `<install_dir>/bin/clang -###` if omitted
    #[arg(long)]
    pub target: Option<String>,

    /// Keep the bundle in this directory (default: a temporary directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Build the bundle without publishing it
    #[arg(long)]
    pub no_upload: bool,

    /// Package host repository
    #[arg(long, default_value = "llvm")]
    pub repo: String,

    /// Package name within the repository
    #[arg(long, default_value = "llvm")]
    pub package: String,

    /// Package host user name (also the subject owning the repository)
    #[arg(long = "user-name", env = "PACKAGE_HOST_USERNAME")]
    pub user_name: Option<String>,

    /// Package host API token
    #[arg(long = "api-token", env = "PACKAGE_HOST_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

impl InstallTreeArgs {
    /// Package host credentials, required unless `--no-upload` is given.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigurationMismatch`] if either value is missing.
    pub fn credentials(&self) -> Result<Credentials, PipelineError> {
        credentials(
            self.user_name.as_deref(),
            self.api_token.as_deref(),
            "--user-name/--api-token or PACKAGE_HOST_USERNAME/PACKAGE_HOST_API_TOKEN",
        )
    }
}

fn credentials(
    username: Option<&str>,
    token: Option<&str>,
    hint: &str,
) -> Result<Credentials, PipelineError> {
    match (username, token) {
        (Some(username), Some(token)) if !username.is_empty() && !token.is_empty() => {
            Ok(Credentials {
                username: username.to_string(),
                token: token.to_string(),
            })
        }
        _ => Err(PipelineError::ConfigurationMismatch(format!(
            "missing credentials; pass {hint}"
        ))),
    }
}
