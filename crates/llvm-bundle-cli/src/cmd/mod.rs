//! Subcommand implementations.

pub mod bundle;
pub mod install_tree;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Resolve where bundles are written.
///
/// Without an explicit directory a temporary one is created; the returned
/// guard removes it when dropped at the end of the run.
pub(crate) fn output_dir(explicit: Option<PathBuf>) -> Result<(PathBuf, Option<TempDir>)> {
    if let Some(dir) = explicit {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        return Ok((dir, None));
    }
    let scratch = tempfile::Builder::new()
        .prefix("llvm-bundle-out-")
        .tempdir()
        .context("Failed to create temporary output directory")?;
    Ok((scratch.path().to_path_buf(), Some(scratch)))
}

/// Operator-facing checksum line.
pub(crate) fn checksum_line(name: &str, digest: &impl std::fmt::Display) -> String {
    format!("Checksum for {name}: {digest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_line() {
        assert_eq!(checksum_line("a.tar.bz2", &"ab12"), "Checksum for a.tar.bz2: ab12");
    }

    #[test]
    fn test_scratch_output_dir_is_removed() {
        let (path, guard) = output_dir(None).unwrap();
        assert!(path.is_dir());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_explicit_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let (path, guard) = output_dir(Some(dir.path().join("out"))).unwrap();
        assert!(guard.is_none());
        assert!(path.is_dir());
    }
}
