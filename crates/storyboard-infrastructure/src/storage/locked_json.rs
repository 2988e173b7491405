//! JSON documents shared between processes.
//!
//! A document is replaced by persisting a fully written temporary file over
//! it, so readers see either the old or the new contents. Merges take an
//! exclusive lock on a sibling `<name>.lock` file that stays on disk; removing
//! it while another writer waits would let two writers lock different inodes.

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use storyboard_core::{Result, StoryboardError};
use tempfile::NamedTempFile;

/// A JSON document at a fixed path.
pub struct LockedJsonFile<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> LockedJsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. A missing or blank file reads as `None`.
    pub fn read(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Replaces the document without taking the lock.
    pub fn replace(&self, document: &T) -> Result<()> {
        let dir = self.parent_dir()?;
        let json = serde_json::to_vec_pretty(document)?;

        let mut staged = NamedTempFile::new_in(&dir)?;
        staged.write_all(&json)?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Reads, modifies and writes back the document while holding the lock.
    ///
    /// A missing file starts from `T::default()`. Nothing is written when
    /// `modify` fails.
    pub fn modify<F>(&self, modify: F) -> Result<()>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let _guard = LockGuard::acquire(&self.lock_path()?)?;
        let mut document = self.read()?.unwrap_or_default();
        modify(&mut document)?;
        self.replace(&document)
    }

    fn parent_dir(&self) -> Result<PathBuf> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn lock_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            StoryboardError::storage(format!("{} has no file name", self.path.display()))
        })?;
        let mut lock_name = name.to_os_string();
        lock_name.push(".lock");
        Ok(self.parent_dir()?.join(lock_name))
    }
}

/// Exclusive lock held until dropped. The lock file itself is kept.
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive().map_err(|err| {
            StoryboardError::storage(format!("could not lock {}: {}", path.display(), err))
        })?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!("[LockedJsonFile] unlock failed: {}", err);
        }
    }
}
