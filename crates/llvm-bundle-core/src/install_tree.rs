//! Bundling a whole LLVM install tree.
//!
//! Unlike [`crate::bundle::BundleBuilder`], which cuts a fixed file list out
//! of an upstream package, this packages everything under an install prefix
//! into `clang+llvm-<tag>-<target>.tar.xz`, every entry prefixed with the
//! bundle name.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use llvm_bundle_schema::{ReleaseVersion, Sha256Digest};
use regex::Regex;
use tar::HeaderMode;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use xz2::write::XzEncoder;

use crate::bundle::{BundleError, BundleResult};

static SHARED_LIBRARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.so(\.\d+)*$").expect("static regex"));

static TARGET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Target: (?P<target>.*)$").expect("static regex"));

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Failed to run {}: {source}", .clang.display())]
    Spawn {
        clang: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot deduce LLVM target from `clang -###` output")]
    NotFound,
}

/// Name of the install-tree bundle, without extension.
pub fn bundle_name(version: &ReleaseVersion, target: &str) -> String {
    format!("clang+llvm-{}-{target}", version.tag())
}

/// Whether a file name looks like a versioned or unversioned shared object.
pub fn is_shared_library(file_name: &str) -> bool {
    SHARED_LIBRARY.is_match(file_name)
}

/// Add the executable bit wherever the matching read bit is set.
///
/// Build tools install shared objects without `x`; a bit is only granted to
/// a class (user, group, other) that can already read the file.
pub fn executable_mode(mode: u32) -> u32 {
    mode | ((mode & 0o444) >> 2)
}

/// Parse the target triple out of `clang -###` output.
pub fn parse_target(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        TARGET_LINE
            .captures(line)
            .map(|c| c["target"].trim().to_string())
    })
}

/// Ask the installed clang for its default target triple.
///
/// # Errors
///
/// Returns [`TargetError::Spawn`] if clang cannot be run and
/// [`TargetError::NotFound`] if its output has no `Target:` line.
pub fn detect_target(install_dir: &Path) -> Result<String, TargetError> {
    let clang = install_dir.join("bin").join("clang");
    let output = Command::new(&clang)
        .arg("-###")
        .output()
        .map_err(|source| TargetError::Spawn {
            clang: clang.clone(),
            source,
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    parse_target(&text).ok_or(TargetError::NotFound)
}

/// Apply [`executable_mode`] to every shared library under `install_dir`.
///
/// Returns the number of files whose mode changed.
///
/// # Errors
///
/// Returns an I/O error if the tree cannot be walked or a mode cannot be set.
#[cfg(unix)]
pub fn mark_shared_libraries_executable(install_dir: &Path) -> std::io::Result<usize> {
    use std::os::unix::fs::PermissionsExt;

    let mut changed = 0;
    for entry in WalkDir::new(install_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_shared_library(&entry.file_name().to_string_lossy())
        {
            continue;
        }
        let mut perms = entry.metadata()?.permissions();
        let mode = perms.mode();
        let updated = executable_mode(mode);
        if updated != mode {
            perms.set_mode(updated);
            std::fs::set_permissions(entry.path(), perms)?;
            debug!(path = %entry.path().display(), "{mode:o} -> {updated:o}");
            changed += 1;
        }
    }
    Ok(changed)
}

#[cfg(not(unix))]
pub fn mark_shared_libraries_executable(_install_dir: &Path) -> std::io::Result<usize> {
    Ok(0)
}

/// Package the install tree at `install_dir` into `<output_dir>/<name>.tar.xz`.
///
/// # Errors
///
/// Returns [`BundleError::MissingInstallDir`] if `install_dir` is not a directory
/// and [`BundleError::Io`] if walking or writing fails.
pub fn bundle_install_tree(
    install_dir: &Path,
    name: &str,
    output_dir: &Path,
) -> Result<BundleResult, BundleError> {
    if !install_dir.is_dir() {
        return Err(BundleError::MissingInstallDir(install_dir.to_path_buf()));
    }

    mark_shared_libraries_executable(install_dir)?;

    let archive_name = format!("{name}.tar.xz");
    info!("bundling LLVM to {archive_name}");
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&archive_name);

    let encoder = XzEncoder::new(BufWriter::new(File::create(&path)?), 6);
    let mut tar = tar::Builder::new(encoder);
    tar.mode(HeaderMode::Deterministic);
    tar.follow_symlinks(false);

    for entry in WalkDir::new(install_dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(install_dir)
            .map_err(std::io::Error::other)?;
        tar.append_path_with_name(entry.path(), Path::new(name).join(relative))?;
    }

    let mut writer = tar.into_inner()?.finish()?;
    writer.flush()?;
    drop(writer);

    let digest = Sha256Digest::compute_file(&path)?;
    Ok(BundleResult {
        name: archive_name,
        path,
        digest,
    })
}
