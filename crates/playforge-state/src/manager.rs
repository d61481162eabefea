//! The state manager implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use playforge_core::clock::Clock;
use playforge_core::error::CoreError;
use playforge_core::record::{ScopeKey, StateRecord};
use playforge_core::store::StateStore;
use serde_json::{Map, Value};
use tracing::debug;

/// Per-key slot: the committed snapshot plus the lock that serializes
/// updates to this key. The committed record is only replaced after the
/// store accepted the new version, and never while an awaited store call
/// is in flight, so readers always observe a complete record.
#[derive(Default)]
struct Entry {
    committed: RwLock<Option<StateRecord>>,
    update_lock: tokio::sync::Mutex<()>,
    hydrated: AtomicBool,
}

/// Versioned per-entity key/value store with atomic partial updates.
pub struct StateManager {
    records: DashMap<ScopeKey, Arc<Entry>>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl StateManager {
    /// Creates a manager over the given storage collaborator.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            store,
            clock,
        }
    }

    fn entry(&self, scope: &ScopeKey) -> Arc<Entry> {
        // Clone the Arc out so the shard guard drops before any await.
        Arc::clone(&self.records.entry(scope.clone()).or_default())
    }

    /// Loads the store's copy into the slot the first time a key is seen.
    /// Must be called while holding the key's update lock.
    async fn hydrate(&self, scope: &ScopeKey, entry: &Entry) -> Result<(), CoreError> {
        if entry.hydrated.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(record) = self.store.load(scope).await? {
            debug!(scope_key = %scope, version = record.version, "hydrated record from store");
            *entry.committed.write().expect("record lock poisoned") = Some(record);
        }
        entry.hydrated.store(true, Ordering::Release);
        Ok(())
    }

    /// Returns the committed snapshot for a scope key, if the record
    /// exists in memory or in the store.
    ///
    /// Never blocks behind updates of a different key; concurrent with an
    /// update of the same key it returns the pre- or post-image, always
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if first-access hydration fails.
    pub async fn get(&self, game_id: &str, key: &str) -> Result<Option<StateRecord>, CoreError> {
        let scope = ScopeKey::new(game_id, key);
        let entry = self.entry(&scope);

        if !entry.hydrated.load(Ordering::Acquire) {
            let _guard = entry.update_lock.lock().await;
            self.hydrate(&scope, &entry).await?;
        }

        Ok(entry.committed.read().expect("record lock poisoned").clone())
    }

    /// Merges `partial` into the record's data and bumps the version.
    ///
    /// Shallow merge: keys present in `partial` replace prior values
    /// wholesale (including nested sequences and maps); absent keys are
    /// preserved. The first update for an unknown scope key creates the
    /// record with `data = {}` before merging. The new version is
    /// persisted before it commits in memory.
    ///
    /// Returns the pre-image (absent on creation) and the post-image.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if hydration or persistence fails; on
    /// failure the prior version remains authoritative.
    pub async fn update(
        &self,
        game_id: &str,
        key: &str,
        partial: Map<String, Value>,
    ) -> Result<(Option<StateRecord>, StateRecord), CoreError> {
        self.update_with(game_id, key, move |_| partial).await
    }

    /// Like [`update`](Self::update), but computes the partial from the
    /// current data inside the key's critical section.
    ///
    /// This is the read-modify-write form: because `f` runs under the same
    /// lock that serializes updates, concurrent derivations never observe
    /// a stale pre-image.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Storage` if hydration or persistence fails; on
    /// failure the prior version remains authoritative.
    pub async fn update_with<F>(
        &self,
        game_id: &str,
        key: &str,
        f: F,
    ) -> Result<(Option<StateRecord>, StateRecord), CoreError>
    where
        F: FnOnce(&Map<String, Value>) -> Map<String, Value> + Send,
    {
        let scope = ScopeKey::new(game_id, key);
        let entry = self.entry(&scope);

        let _guard = entry.update_lock.lock().await;
        self.hydrate(&scope, &entry).await?;

        let old = entry
            .committed
            .read()
            .expect("record lock poisoned")
            .clone();
        let mut data = old.as_ref().map(|r| r.data.clone()).unwrap_or_default();
        let partial = f(&data);
        for (field, value) in partial {
            data.insert(field, value);
        }

        let new = StateRecord {
            game_id: scope.game_id.clone(),
            key: scope.key.clone(),
            data,
            version: old.as_ref().map_or(0, |r| r.version) + 1,
            updated_at: self.clock.now(),
        };

        self.store.save(&scope, &new).await?;
        *entry.committed.write().expect("record lock poisoned") = Some(new.clone());
        debug!(scope_key = %scope, version = new.version, "committed state update");

        Ok((old, new))
    }

    /// Forces a persistence flush of the current in-memory record, absent
    /// a new update.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if no record exists for the scope
    /// key, and `CoreError::Storage` if the flush fails.
    pub async fn save(&self, game_id: &str, key: &str) -> Result<StateRecord, CoreError> {
        let scope = ScopeKey::new(game_id, key);
        let entry = self.entry(&scope);

        let _guard = entry.update_lock.lock().await;
        self.hydrate(&scope, &entry).await?;

        let record = entry
            .committed
            .read()
            .expect("record lock poisoned")
            .clone()
            .ok_or_else(|| CoreError::Validation(format!("no state record for '{scope}'")))?;

        self.store.save(&scope, &record).await?;
        debug!(scope_key = %scope, version = record.version, "flushed record to store");
        Ok(record)
    }
}
