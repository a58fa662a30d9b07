//! Deterministic bundle archives.
//!
//! A bundle is a `.tar.bz2` holding `LICENSE.TXT` followed by the package's
//! files in declaration order. Entry names are relative to the payload root
//! and headers are written in deterministic mode, so identical inputs yield
//! byte-identical archives and therefore identical checksums.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bzip2::Compression;
use bzip2::write::BzEncoder;
use llvm_bundle_schema::{ArtifactPackageSpec, LICENSE_ARCNAME, Sha256Digest, TemplateVars};
use tar::HeaderMode;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum BundleError {
    /// The platform table names a file the upstream payload does not have.
    #[error("File {path} does not exist in {}", .source_dir.display())]
    MissingFile { path: String, source_dir: PathBuf },

    #[error("License file {} does not exist", .0.display())]
    MissingLicense(PathBuf),

    #[error("Install directory {} does not exist", .0.display())]
    MissingInstallDir(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A finished bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleResult {
    /// Archive file name, also the asset name when published.
    pub name: String,
    /// Location of the archive.
    pub path: PathBuf,
    /// SHA-256 of the final archive bytes.
    pub digest: Sha256Digest,
}

/// Writes bundles into an output directory.
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    output_dir: PathBuf,
}

impl BundleBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Bundle `spec`'s files from `source_dir` together with `license`.
    ///
    /// Every file is checked before the archive is created, so a mismatch
    /// between the platform table and the upstream layout leaves nothing
    /// half-written behind.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::MissingFile`] or [`BundleError::MissingLicense`]
    /// for absent inputs, and [`BundleError::Io`] if writing fails.
    pub fn build(
        &self,
        spec: &ArtifactPackageSpec,
        source_dir: &Path,
        license: &Path,
        vars: &TemplateVars<'_>,
    ) -> Result<BundleResult, BundleError> {
        let name = spec.output_name(vars);
        let files = spec.file_paths(vars);

        if !license.is_file() {
            return Err(BundleError::MissingLicense(license.to_path_buf()));
        }
        for file in &files {
            if std::fs::symlink_metadata(source_dir.join(file)).is_err() {
                return Err(BundleError::MissingFile {
                    path: file.clone(),
                    source_dir: source_dir.to_path_buf(),
                });
            }
        }

        info!("bundling files to {name}");
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(&name);

        let encoder = BzEncoder::new(BufWriter::new(File::create(&path)?), Compression::best());
        let mut tar = tar::Builder::new(encoder);
        tar.mode(HeaderMode::Deterministic);
        tar.follow_symlinks(false);

        tar.append_path_with_name(license, LICENSE_ARCNAME)?;
        for file in &files {
            tar.append_path_with_name(source_dir.join(file), file)?;
        }

        let mut writer = tar.into_inner()?.finish()?;
        writer.flush()?;
        drop(writer);

        let digest = Sha256Digest::compute_file(&path)?;
        info!("checksum for {name}: {digest}");

        Ok(BundleResult { name, path, digest })
    }
}
