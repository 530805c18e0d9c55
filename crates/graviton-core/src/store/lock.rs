//! Exclusive lock files for cross-process store mutation.
//!
//! A lock file is created with `create_new`, so acquisition either wins at
//! once or fails with `StoreError::LockBusy`; nothing waits. The file body
//! names its holder, which is echoed back to whoever finds it busy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::StoreError;

/// Lock path guarding `path` (`<path>.lock`).
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock: OsString = path.as_os_str().to_os_string();
    lock.push(".lock");
    PathBuf::from(lock)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockHolder {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    /// Who holds the lock at `path`, as far as the file says.
    fn describe(path: &Path) -> String {
        fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockHolder>(&bytes).ok())
            .map(|holder| {
                format!(
                    "pid {} since {}",
                    holder.pid,
                    holder.acquired_at.to_rfc3339()
                )
            })
            .unwrap_or_else(|| "an unknown holder".to_string())
    }
}

/// Holds an exclusive lock file until dropped.
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
    _file: File,
}

impl FileLockGuard {
    pub fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::LockBusy {
                    holder: LockHolder::describe(&path),
                    lock_path: path.display().to_string(),
                });
            }
            Err(err) => return Err(lock_io(&path, err.to_string())),
        };

        let record = serde_json::to_vec(&LockHolder::current())
            .map_err(|e| lock_io(&path, e.to_string()))?;
        if let Err(err) = file.write_all(&record) {
            let _ = fs::remove_file(&path);
            return Err(lock_io(&path, err.to_string()));
        }
        Ok(Self { path, _file: file })
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_io(path: &Path, message: String) -> StoreError {
    StoreError::LockIo {
        lock_path: path.display().to_string(),
        message,
    }
}
