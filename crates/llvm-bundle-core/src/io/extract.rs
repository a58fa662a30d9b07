//! Archive extraction module
//!
//! One entry point, [`Extractor::extract`], dispatching on [`ArchiveFormat`]:
//! - tar.xz / lzma: decompressed fully in memory, then unpacked as a tar stream.
//! - installer / 7z: written to a temp file and unpacked by the external 7-Zip tool.
//!
//! Every failure here is fatal; a corrupt archive will not improve on retry.

use std::io::{self, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use llvm_bundle_schema::ArchiveFormat;
use thiserror::Error;
use tracing::{debug, warn};
use xz2::read::XzDecoder;
use xz2::stream::Stream;

/// Default name of the 7-Zip executable looked up on `PATH`.
pub const SEVEN_ZIP: &str = "7z";

/// Decoder memory ceiling; upstream archives need well under this.
const DECODER_MEMORY_LIMIT: u64 = 1 << 30;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt or truncated archive: {0}")]
    Corrupt(String),

    #[error("Archive contains no entries")]
    Empty,

    #[error("Extraction tool '{0}' is not available")]
    ToolUnavailable(String),

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
}

fn corrupt(err: impl ToString) -> ExtractError {
    ExtractError::Corrupt(err.to_string())
}

/// Unpacks upstream archives into a destination directory.
#[derive(Debug, Clone)]
pub struct Extractor {
    seven_zip: String,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_tool(SEVEN_ZIP)
    }
}

impl Extractor {
    /// Use a specific 7-Zip executable (name on `PATH` or absolute path).
    pub fn with_tool(seven_zip: impl Into<String>) -> Self {
        Self {
            seven_zip: seven_zip.into(),
        }
    }

    /// Extract `bytes` into `dest` and return the payload directory.
    ///
    /// For tar formats that is the archive's first top-level member, whose
    /// name is not known in advance; for 7-Zip formats it is `dest` itself.
    ///
    /// This blocks; async callers should run it on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Corrupt`] for undecodable input,
    /// [`ExtractError::ToolUnavailable`] when 7-Zip is missing and
    /// [`ExtractError::ToolFailed`] when it exits unsuccessfully.
    pub fn extract(
        &self,
        format: ArchiveFormat,
        bytes: &[u8],
        dest: &Path,
    ) -> Result<PathBuf, ExtractError> {
        std::fs::create_dir_all(dest)?;
        match format {
            ArchiveFormat::TarXz => {
                let tar = decompress(XzDecoder::new(bytes))?;
                unpack_tar(&tar, dest)
            }
            ArchiveFormat::TarLzma => {
                // Accepts both xz containers and legacy lzma-alone streams.
                let stream =
                    Stream::new_auto_decoder(DECODER_MEMORY_LIMIT, 0).map_err(corrupt)?;
                let tar = decompress(XzDecoder::new_stream(bytes, stream))?;
                unpack_tar(&tar, dest)
            }
            ArchiveFormat::Installer => self.extract_with_7zip(bytes, dest, ".exe"),
            ArchiveFormat::SevenZip => self.extract_with_7zip(bytes, dest, ".7z"),
        }
    }

    fn extract_with_7zip(
        &self,
        bytes: &[u8],
        dest: &Path,
        suffix: &str,
    ) -> Result<PathBuf, ExtractError> {
        let tool = which::which(&self.seven_zip)
            .map_err(|_| ExtractError::ToolUnavailable(self.seven_zip.clone()))?;

        let mut archive = tempfile::Builder::new()
            .prefix("llvm-bundle-")
            .suffix(suffix)
            .tempfile()?;
        archive.write_all(bytes)?;
        archive.flush()?;

        debug!(tool = %tool.display(), dest = %dest.display(), "running 7-Zip");
        let output = Command::new(&tool)
            .arg("-y")
            .arg("x")
            .arg(archive.path())
            .arg(format!("-o{}", dest.display()))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(ExtractError::ToolFailed {
                tool: self.seven_zip.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(dest.to_path_buf())
    }
}

fn decompress(mut decoder: impl Read) -> Result<Vec<u8>, ExtractError> {
    let mut tar = Vec::new();
    decoder.read_to_end(&mut tar).map_err(corrupt)?;
    Ok(tar)
}

fn unpack_tar(data: &[u8], dest: &Path) -> Result<PathBuf, ExtractError> {
    let mut archive = tar::Archive::new(Cursor::new(data));
    archive.set_preserve_permissions(true);

    let mut root: Option<PathBuf> = None;
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();

        if root.is_none() {
            root = path.components().find_map(|c| match c {
                Component::Normal(name) => Some(PathBuf::from(name)),
                _ => None,
            });
        }

        if !entry.unpack_in(dest)? {
            warn!(path = %path.display(), "skipped archive entry outside destination");
        }
    }

    root.map(|r| dest.join(r)).ok_or(ExtractError::Empty)
}
