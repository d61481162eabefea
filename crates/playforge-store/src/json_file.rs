//! JSON-file state store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use playforge_core::error::CoreError;
use playforge_core::record::{ScopeKey, StateRecord};
use playforge_core::store::StateStore;
use tracing::debug;

/// A `StateStore` keeping one JSON file per scope key under a directory.
///
/// Writes go to a temporary sibling first and are moved into place with a
/// rename, so a concurrent `load` observes either the old record or the
/// new one, never a torn file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `dir`. The directory is created on the
    /// first `save`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, scope_key: &ScopeKey) -> PathBuf {
        let file = format!(
            "{}__{}.json",
            sanitize(&scope_key.game_id),
            sanitize(&scope_key.key)
        );
        self.dir.join(file)
    }
}

/// Maps a scope-key component onto the filename-safe alphabet. Ids are
/// expected to be identifier-like; anything else collapses to '-'.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn storage_error(context: &str, path: &Path, err: &dyn std::fmt::Display) -> CoreError {
    CoreError::Storage(format!("{context} {}: {err}", path.display()))
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self, scope_key: &ScopeKey) -> Result<Option<StateRecord>, CoreError> {
        let path = self.path_for(scope_key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(storage_error("failed to read", &path, &err)),
        };

        let record: StateRecord = serde_json::from_slice(&bytes)
            .map_err(|err| storage_error("failed to parse", &path, &err))?;
        Ok(Some(record))
    }

    async fn save(&self, scope_key: &ScopeKey, record: &StateRecord) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| storage_error("failed to create", &self.dir, &err))?;

        let path = self.path_for(scope_key);
        let tmp = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|err| storage_error("failed to serialize", &path, &err))?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| storage_error("failed to write", &tmp, &err))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| storage_error("failed to move", &tmp, &err))?;

        debug!(scope_key = %scope_key, version = record.version, path = %path.display(), "record persisted");
        Ok(())
    }
}
