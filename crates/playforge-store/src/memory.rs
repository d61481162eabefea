//! In-memory state store for tests and ephemeral deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use playforge_core::error::CoreError;
use playforge_core::record::{ScopeKey, StateRecord};
use playforge_core::store::StateStore;

/// A `StateStore` backed by a concurrent in-memory map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<ScopeKey, StateRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, scope_key: &ScopeKey) -> Result<Option<StateRecord>, CoreError> {
        Ok(self.records.get(scope_key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, scope_key: &ScopeKey, record: &StateRecord) -> Result<(), CoreError> {
        self.records.insert(scope_key.clone(), record.clone());
        Ok(())
    }
}
