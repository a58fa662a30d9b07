//! `llvm-bundle install-tree`

use anyhow::{Context, Result};
use llvm_bundle_core::install_tree::{bundle_install_tree, bundle_name, detect_target};
use llvm_bundle_core::io::build_client;
use llvm_bundle_core::registry::package_host::PackageHost;
use llvm_bundle_core::{PipelineError, RetryPolicy};
use tracing::info;

use super::{checksum_line, output_dir};
use crate::InstallTreeArgs;

/// Bundle an install tree and, unless disabled, publish it to the package host.
pub async fn install_tree(args: InstallTreeArgs) -> Result<()> {
    let version = args.version.resolve();
    let credentials = if args.no_upload {
        None
    } else {
        Some(args.credentials()?)
    };

    let target = match &args.target {
        Some(target) => target.clone(),
        None => detect_target(&args.install_dir).map_err(PipelineError::from)?,
    };
    info!("target triple {target}");

    let name = bundle_name(&version, &target);
    let (output_dir, _scratch) = output_dir(args.output_dir.clone())?;

    let install_dir = args.install_dir.clone();
    let out = output_dir.clone();
    let bundle = tokio::task::spawn_blocking(move || bundle_install_tree(&install_dir, &name, &out))
        .await
        .context("Bundling task failed")?
        .map_err(PipelineError::from)?;
    println!("{}", checksum_line(&bundle.name, &bundle.digest));

    if let Some(credentials) = credentials {
        let client = build_client().context("Failed to build HTTP client")?;
        let host = PackageHost::new(client, &args.repo, &args.package, credentials);
        host.release(&RetryPolicy::default(), &version.tag(), &bundle)
            .await
            .map_err(PipelineError::from)?;
    }
    Ok(())
}
