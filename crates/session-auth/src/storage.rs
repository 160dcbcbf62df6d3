//! Device-local key-value storage
//!
//! The token store persists through a small string key/value interface, the
//! same shape as browser local storage. Every operation is synchronous: the
//! credential attacher reads through it on the hot path of every request.
//!
//! `FileStorage` keeps one file per key. Writes go to a temp file in the same
//! directory which is then renamed over the target, so a reader observes
//! either the previous complete value or the next one, never a torn write.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Synchronous string key/value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Read a value. A missing key is `Ok(None)`.
    fn get_item(&self, key: &str) -> io::Result<Option<String>>;

    /// Write a value, replacing any existing one.
    fn set_item(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> io::Result<()>;
}

/// File-per-key storage under a directory.
///
/// The directory is created on first write. Files are `0600` on unix since
/// they hold credentials.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        write_atomic(&self.path_for(key), value)
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                debug!(key, "removed stored item");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Distinguishes temp files of concurrent writers within one process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write a value to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) before
/// the rename so the value is never readable by others.
fn write_atomic(path: &Path, value: &str) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "storage path has no parent directory")
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(
        ".{file_name}.tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = persist(&tmp_path, path, value);
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    written?;
    debug!(path = %path.display(), "persisted item");
    Ok(())
}

fn persist(tmp_path: &Path, path: &Path, value: &str) -> io::Result<()> {
    std::fs::write(tmp_path, value.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(tmp_path, path)
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}
