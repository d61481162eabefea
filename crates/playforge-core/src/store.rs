//! State persistence abstraction.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::record::{ScopeKey, StateRecord};

/// Storage collaborator for state records.
///
/// Implementations must make `save` atomic from the reader's perspective:
/// a concurrent `load` observes either the previous record or the new one,
/// never a partial write.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the record for a scope key, if one was ever saved.
    async fn load(&self, scope_key: &ScopeKey) -> Result<Option<StateRecord>, CoreError>;

    /// Persists the record for a scope key, replacing any prior version.
    async fn save(&self, scope_key: &ScopeKey, record: &StateRecord) -> Result<(), CoreError>;
}
