//! Versioned per-entity state records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifies one state record: a `(game_id, key)` pair.
///
/// The key is usually a player id, but any per-game partition works.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    /// The owning game.
    pub game_id: String,
    /// The record key within the game.
    pub key: String,
}

impl ScopeKey {
    /// Creates a scope key.
    #[must_use]
    pub fn new(game_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.game_id, self.key)
    }
}

/// One versioned state record.
///
/// `version` strictly increases on every successful update; no two updates
/// to the same record observe the same prior version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// The owning game.
    pub game_id: String,
    /// The record key within the game.
    pub key: String,
    /// The record's data fields.
    pub data: Map<String, Value>,
    /// Monotonically increasing update counter.
    pub version: u64,
    /// Timestamp of the last successful update.
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    /// Returns this record's scope key.
    #[must_use]
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::new(self.game_id.clone(), self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_key_display_joins_with_colon() {
        let key = ScopeKey::new("g1", "p1");
        assert_eq!(key.to_string(), "g1:p1");
    }
}
