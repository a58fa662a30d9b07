//! `llvm-bundle bundle`

use anyhow::{Context, Result};
use llvm_bundle_core::io::build_client;
use llvm_bundle_core::paths::default_cache_dir;
use llvm_bundle_core::registry::github::GitHubRegistry;
use llvm_bundle_core::{ArchiveCache, HttpFetcher, Pipeline, ReleasePublisher, RetryPolicy};
use llvm_bundle_schema::PlatformTable;
use tracing::info;

use super::{checksum_line, output_dir};
use crate::BundleArgs;

fn load_table(args: &BundleArgs) -> Result<PlatformTable> {
    match &args.platforms {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read platform table {}", path.display()))?;
            PlatformTable::from_toml_str(&content)
                .with_context(|| format!("Invalid platform table {}", path.display()))
        }
        None => PlatformTable::builtin().context("Built-in platform table is invalid"),
    }
}

/// Bundle every selected platform and, unless disabled, publish the result.
pub async fn bundle(args: BundleArgs) -> Result<()> {
    let version = args.version.resolve();
    let table = load_table(&args)?;

    // Checked before any download.
    let credentials = if args.no_upload {
        None
    } else {
        Some(args.credentials()?)
    };

    let client = build_client().context("Failed to build HTTP client")?;
    let (output_dir, _scratch) = output_dir(args.output_dir.clone())?;

    let mut pipeline = Pipeline::new(&table, HttpFetcher::new(client.clone())).keep_temp(args.keep_temp);

    if !args.no_cache {
        let dir = args
            .cache_dir
            .clone()
            .or_else(default_cache_dir)
            .context("Cannot determine a cache directory; pass --cache-dir or --no-cache")?;
        let cache = ArchiveCache::open(&dir)
            .with_context(|| format!("Failed to open cache {}", dir.display()))?;
        info!("using archive cache {}", dir.display());
        pipeline = pipeline.with_cache(cache);
    }

    if let Some(credentials) = credentials {
        let registry = GitHubRegistry::new(client, &args.org, &args.repo, credentials);
        pipeline = pipeline.with_publisher(ReleasePublisher::new(registry, RetryPolicy::default()));
    }

    let report = pipeline.run(&version, &args.only, &output_dir).await?;

    for (name, digest) in &report {
        println!("{}", checksum_line(name, digest));
    }
    if report.is_empty() {
        info!("no platform had a build for LLVM {}", version.tag());
    } else if args.output_dir.is_some() {
        info!("bundles written to {}", output_dir.display());
    }
    Ok(())
}
