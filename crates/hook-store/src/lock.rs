//! Advisory file locking for store writes.
//!
//! The lock lives in a sibling `.lock` file so the document itself can be
//! atomically replaced while the lock is held. It is held only across a
//! single read-modify-write; never across subprocess calls.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Guard that releases the lock on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Acquire an exclusive lock, blocking until any concurrent writer is done.
pub fn acquire(path: &Path) -> Result<StoreLock> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create lock dir: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    file.lock_exclusive()
        .with_context(|| format!("failed to lock: {}", path.display()))?;

    Ok(StoreLock { file })
}
