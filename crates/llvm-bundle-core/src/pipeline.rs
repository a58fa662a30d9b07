//! The per-platform release pipeline.
//!
//! For each selected platform, strictly one after another:
//! cached fetch, extract, bundle every package, then publish. A 404 on a
//! platform's upstream archive skips that platform; any other failure ends
//! the run. All of a platform's bundles are built before anything is
//! uploaded, so a layout mismatch never leaves a half-published platform.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use llvm_bundle_schema::{
    LICENSE_ARCNAME, PlatformTable, PlatformTarget, ReleaseVersion, Sha256Digest, TemplateVars,
};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::bundle::{BundleBuilder, BundleResult};
use crate::cache::ArchiveCache;
use crate::error::PipelineError;
use crate::io::extract::Extractor;
use crate::io::fetch::{FetchError, Fetcher};
use crate::publish::ReleasePublisher;
use crate::registry::{NewRelease, ReleaseRegistry};

/// Bundle name to checksum, across every processed platform.
pub type ChecksumReport = BTreeMap<String, Sha256Digest>;

/// A scratch directory removed on drop unless it should be retained.
struct ScratchDir {
    dir: Option<TempDir>,
    keep: bool,
}

impl ScratchDir {
    fn new(prefix: &str, keep: bool) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(Self {
            dir: Some(dir),
            keep,
        })
    }

    fn path(&self) -> &Path {
        self.dir.as_ref().map_or(Path::new(""), TempDir::path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.keep {
                let path = dir.keep();
                warn!("keeping temporary directory {}", path.display());
            }
        }
    }
}

/// Orchestrates fetch, extract, bundle and publish over a platform table.
pub struct Pipeline<'a, F, R> {
    table: &'a PlatformTable,
    fetcher: F,
    cache: Option<ArchiveCache>,
    extractor: Extractor,
    publisher: Option<ReleasePublisher<R>>,
    keep_temp: bool,
}

impl<'a, F: Fetcher, R: ReleaseRegistry> Pipeline<'a, F, R> {
    /// A pipeline with no cache that publishes nothing.
    pub fn new(table: &'a PlatformTable, fetcher: F) -> Self {
        Self {
            table,
            fetcher,
            cache: None,
            extractor: Extractor::default(),
            publisher: None,
            keep_temp: false,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ArchiveCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Publish every platform's bundles through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: ReleasePublisher<R>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Retain extraction directories instead of deleting them.
    #[must_use]
    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Run the pipeline for `version` over the platforms named in `only`
    /// (all when empty), writing bundles into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns the first error other than a missing upstream archive.
    pub async fn run(
        &self,
        version: &ReleaseVersion,
        only: &[String],
        output_dir: &Path,
    ) -> Result<ChecksumReport, PipelineError> {
        let platforms = self.table.select(only)?;
        info!(
            "packaging LLVM {} for {} platform(s)",
            version.tag(),
            platforms.len()
        );

        let scratch = ScratchDir::new("llvm-bundle-", false)?;
        let license = self.acquire_license(version, scratch.path()).await?;

        let mut report = ChecksumReport::new();
        for platform in platforms {
            match self
                .process_platform(platform, version, &license, output_dir)
                .await?
            {
                Some(bundles) => {
                    report.extend(bundles.into_iter().map(|b| (b.name, b.digest)));
                }
                None => {
                    warn!(
                        "no LLVM {} build for {}, skipping",
                        version.tag(),
                        platform.name
                    );
                }
            }
        }
        Ok(report)
    }

    async fn acquire_license(
        &self,
        version: &ReleaseVersion,
        scratch: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let url = self.table.license_url(version);
        let name = format!("LICENSE-{}.TXT", version.tag());
        let bytes = self.cached_fetch(&name, &url).await?;

        let path = scratch.join(LICENSE_ARCNAME);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Process one platform. `None` means upstream has no build for it.
    async fn process_platform(
        &self,
        platform: &PlatformTarget,
        version: &ReleaseVersion,
        license: &Path,
        output_dir: &Path,
    ) -> Result<Option<Vec<BundleResult>>, PipelineError> {
        let archive = platform.archive_name(version);
        let url = platform.download_url(version);

        let bytes = match self.cached_fetch(&archive, &url).await {
            Ok(bytes) => bytes,
            Err(FetchError::NotFound { url }) => {
                debug!(url = %url, "upstream archive not found");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let scratch = ScratchDir::new(&format!("llvm-bundle-{}-", platform.name), self.keep_temp)?;

        info!("extracting {archive}");
        let extractor = self.extractor.clone();
        let format = platform.format;
        let dest = scratch.path().to_path_buf();
        let payload =
            tokio::task::spawn_blocking(move || extractor.extract(format, &bytes, &dest))
                .await??;
        debug!(payload = %payload.display(), "extracted");

        let builder = BundleBuilder::new(output_dir);
        let packages = platform.packages.clone();
        let platform_name = platform.name.clone();
        let bundle_version = version.clone();
        let license = license.to_path_buf();
        let bundles = tokio::task::spawn_blocking(move || {
            let vars = TemplateVars::new(&bundle_version, &platform_name).with_archive(&archive);
            packages
                .iter()
                .map(|spec| builder.build(spec, &payload, &license, &vars))
                .collect::<Result<Vec<_>, _>>()
        })
        .await??;

        if let Some(publisher) = &self.publisher {
            publisher
                .publish(&NewRelease::for_version(version), &bundles)
                .await?;
        }

        Ok(Some(bundles))
    }

    /// Read `name` from the cache, or fetch `url` and store it.
    ///
    /// Cache failures only cost a re-download, so they are logged, not raised.
    async fn cached_fetch(&self, name: &str, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(cache) = &self.cache {
            match cache.get(name).await {
                Ok(Some(bytes)) => {
                    info!("using cached {name}");
                    return Ok(bytes);
                }
                Ok(None) => {}
                Err(e) => warn!("cannot read cached {name}: {e}"),
            }
        }

        let bytes = self.fetcher.fetch(url).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(name, &bytes).await {
                warn!("cannot cache {name}: {e}");
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let scratch = ScratchDir::new("llvm-bundle-test-", false).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dir_kept_when_asked() {
        let scratch = ScratchDir::new("llvm-bundle-test-", true).unwrap();
        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(path.is_dir());
        std::fs::remove_dir_all(path).unwrap();
    }
}
