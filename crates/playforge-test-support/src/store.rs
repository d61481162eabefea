//! Test stores — mock `StateStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use playforge_core::error::CoreError;
use playforge_core::record::{ScopeKey, StateRecord};
use playforge_core::store::StateStore;

/// A state store that keeps records in memory and records every `save`
/// call in order. `load` serves the most recently saved record.
#[derive(Debug, Default)]
pub struct RecordingStore {
    records: Mutex<HashMap<ScopeKey, StateRecord>>,
    saved: Mutex<Vec<(ScopeKey, StateRecord)>>,
    fail_saves: AtomicBool,
}

impl RecordingStore {
    /// Creates an empty recording store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with the given records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn seeded(records: Vec<StateRecord>) -> Self {
        let store = Self::default();
        {
            let mut map = store.records.lock().unwrap();
            for record in records {
                map.insert(record.scope_key(), record);
            }
        }
        store
    }

    /// Returns a snapshot of all `save` calls in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn saved_records(&self) -> Vec<(ScopeKey, StateRecord)> {
        self.saved.lock().unwrap().clone()
    }

    /// Makes subsequent `save` calls fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn load(&self, scope_key: &ScopeKey) -> Result<Option<StateRecord>, CoreError> {
        Ok(self.records.lock().unwrap().get(scope_key).cloned())
    }

    async fn save(&self, scope_key: &ScopeKey, record: &StateRecord) -> Result<(), CoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("write failed".into()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(scope_key.clone(), record.clone());
        self.saved
            .lock()
            .unwrap()
            .push((scope_key.clone(), record.clone()));
        Ok(())
    }
}

/// A state store that fails every call with a storage error. Useful for
/// testing the prior-version-remains-authoritative contract.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl StateStore for FailingStore {
    async fn load(&self, _scope_key: &ScopeKey) -> Result<Option<StateRecord>, CoreError> {
        Err(CoreError::Storage("connection refused".into()))
    }

    async fn save(&self, _scope_key: &ScopeKey, _record: &StateRecord) -> Result<(), CoreError> {
        Err(CoreError::Storage("connection refused".into()))
    }
}
