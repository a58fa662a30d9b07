//! On-disk archive cache keyed by canonical archive file name.
//!
//! Layout: `<root>/<archive name>`. There is no eviction; entries persist
//! until the directory is cleared externally. Entries are replaced
//! wholesale through a `.partial` file and a rename, never edited in place.

use std::io;
use std::path::PathBuf;

use tracing::debug;

/// Directory-backed cache of downloaded upstream archives.
#[derive(Debug, Clone)]
pub struct ArchiveCache {
    root: PathBuf,
}

impl ArchiveCache {
    /// Open (and create if needed) a cache rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// On-disk location of an entry, whether or not it exists.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] if `name` is not a bare file name.
    pub fn path(&self, name: &str) -> io::Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache entry name: '{name}'"),
            ));
        }
        Ok(self.root.join(name))
    }

    /// Read an entry, or `None` if it was never stored.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for anything other than a missing entry.
    pub async fn get(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(entry = name, bytes = bytes.len(), "cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Store an entry, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the entry cannot be written.
    pub async fn put(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path(name)?;
        let partial = self.root.join(format!("{name}.partial"));
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await?;
        debug!(entry = name, bytes = bytes.len(), "cache store");
        Ok(())
    }
}
