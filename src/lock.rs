//! File-based locking for single-writer safety.
//!
//! Cross-platform (fs2) advisory lock: ровно один процесс-владелец на
//! session-store. Lock file path: `<store>.lock`, рядом с файлом стора.
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}

fn lock_file_path(store_path: &Path) -> PathBuf {
    let mut os = store_path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

fn open_lock_file(store_path: &Path) -> Result<(std::fs::File, PathBuf)> {
    let path = lock_file_path(store_path);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    Ok((f, path))
}

/// Acquire the writer lock. Blocks until acquired.
pub fn acquire_exclusive(store_path: &Path) -> Result<LockGuard> {
    let (file, path) = open_lock_file(store_path)?;
    file.lock_exclusive()
        .with_context(|| format!("lock_exclusive {}", path.display()))?;
    Ok(LockGuard { file, path })
}

/// Try to acquire the writer lock. Returns Err if another writer holds it.
pub fn try_acquire_exclusive(store_path: &Path) -> Result<LockGuard> {
    let (file, path) = open_lock_file(store_path)?;
    file.try_lock_exclusive()
        .with_context(|| format!("try_lock_exclusive failed: {}", path.display()))?;
    Ok(LockGuard { file, path })
}
