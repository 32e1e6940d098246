//! Advisory locks and crash-safe writes for case directories.
//!
//! - Exclusive advisory locks (fs2/flock) with a bounded wait
//! - Whole-file atomic replace (temp file in the same directory + rename)
//! - Append-only writes that never touch existing bytes

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Name of the lock file inside a case directory or tasks root
pub const LOCK_FILE: &str = ".lock";

/// Marker embedded in atomic-write temporaries
pub const TEMP_MARKER: &str = ".tmp";

const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, lock/sharing violations surface as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

/// A file lock guard that releases the lock when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock, waiting up to `timeout_ms`.
    ///
    /// The lock file is created if missing; its parent must exist.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock { file });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Lock the advisory lock file of a directory.
    pub fn acquire_dir(dir: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        Self::acquire(dir.as_ref().join(LOCK_FILE), timeout_ms)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Atomically replace a file.
///
/// Data goes to a temporary file next to `path`, is synced, then renamed
/// over the target. Readers see the old or the new content, never a mix.
/// The temporary is removed if anything fails before the rename.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .ok_or_else(|| Error::OperationFailed(format!("no parent for {}", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file");

    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{file_name}{TEMP_MARKER}."))
        .tempfile_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| Error::Io(err.error))?;

    Ok(())
}

/// Atomically write string data to a file
pub fn write_atomic_str(path: impl AsRef<Path>, data: &str) -> Result<()> {
    write_atomic(path, data.as_bytes())
}

/// Append bytes to the end of a file without touching existing content.
pub fn append(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().append(true).open(path.as_ref())?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

/// Whether a file name looks like a leftover atomic-write temporary.
pub fn is_temp_file_name(name: &str) -> bool {
    name.contains(&format!("{TEMP_MARKER}."))
}

/// Remove a directory tree, ignoring a missing target.
pub fn remove_dir_quietly(path: &Path) {
    if let Err(err) = fs::remove_dir_all(path) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to clean up directory");
        }
    }
}
