use log::debug;
use questline_core::ProfileStorage;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("user id '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidUserId(String),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One pretty-printed JSON document per user under a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profile_path(&self, user_id: &str) -> Result<PathBuf, StorageError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.root.join(format!("{user_id}.json")))
    }

    /// Where an unreadable profile is copied before it gets overwritten.
    pub fn backup_path(&self, user_id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.profile_path(user_id)?.with_extension("json.bak"))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ProfileStorage for FileStorage {
    type Error = StorageError;

    fn load_profile(&self, user_id: &str) -> Result<Option<Value>, Self::Error> {
        let path = self.profile_path(user_id)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path)(err)),
        };
        debug!("loaded {}", path.display());
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StorageError::Json { path, source })
    }

    fn save_profile(&self, user_id: &str, document: &Value) -> Result<(), Self::Error> {
        let path = self.profile_path(user_id)?;
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;
        let payload = serde_json::to_vec_pretty(document).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;
        // Stage beside the target, then rename into place.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(io_error(&staging))?;
        fs::rename(&staging, &path).map_err(io_error(&path))?;
        debug!("saved {}", path.display());
        Ok(())
    }

    fn delete_profile(&self, user_id: &str) -> Result<(), Self::Error> {
        let path = self.profile_path(user_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    fn archive_profile(&self, user_id: &str) -> Result<(), Self::Error> {
        let path = self.profile_path(user_id)?;
        let backup = self.backup_path(user_id)?;
        match fs::copy(&path, &backup) {
            Ok(_) => {
                debug!("archived {} to {}", path.display(), backup.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&backup)(err)),
        }
    }
}
