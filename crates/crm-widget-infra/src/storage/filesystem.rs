//! Local filesystem key-value storage.
//!
//! Implements the `KeyValueStorage` trait from `crm-widget-core` with one
//! file per key:
//!
//! ```text
//! {base_dir}/
//!   crm_visitor_session.json
//!   .crm_visitor_session.XXXXXX.json.tmp   (only while a write is in flight)
//! ```
//!
//! Each write goes to its own uniquely named temporary sibling and is renamed
//! into place, so a crash mid-write never leaves a truncated value behind and
//! concurrent writers never share a temp file.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crm_widget_core::storage::kv_store::KeyValueStorage;
use crm_widget_types::error::StorageError;

/// Filesystem-backed key-value storage rooted at `base_dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    /// Create a storage rooted at `base_dir`. The directory is created on the
    /// first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Compute the file path for a key.
    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io(format!("{}: {err}", path.display()))
}

/// Write `value` to a fresh temp file in `dir`, then rename it over `target`.
fn write_atomic(dir: &Path, prefix: &str, target: &Path, value: &str) -> Result<(), StorageError> {
    let mut temp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".json.tmp")
        .tempfile_in(dir)
        .map_err(|e| io_error(dir, e))?;
    temp.write_all(value.as_bytes())
        .map_err(|e| io_error(temp.path(), e))?;
    temp.persist(target).map_err(|e| io_error(target, e.error))?;
    Ok(())
}

impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| io_error(&self.base_dir, e))?;

        let dir = self.base_dir.clone();
        let prefix = format!(".{key}.");
        let target = path.clone();
        let value = value.to_string();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &prefix, &target, &value))
            .await
            .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))??;

        tracing::debug!(key, path = %path.display(), "stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path, err)),
        }
    }
}
