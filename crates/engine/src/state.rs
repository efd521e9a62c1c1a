//! State store and clock abstractions.
//!
//! The backend state store is read-only from the engine's perspective and
//! may change at any time between a read and its use. Derivation therefore
//! always re-reads through [`StateStore::get`] instead of caching.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

// ──────────────────────────────────────────────
// EntityState
// ──────────────────────────────────────────────

/// Snapshot of a single entity: its state string plus free-form attributes.
///
/// Timestamps are RFC 3339 strings as delivered by the backend; they are
/// parsed only where derivation needs them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl EntityState {
    pub fn new(state: impl Into<String>) -> Self {
        EntityState {
            state: state.into(),
            ..EntityState::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: serde_json::Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}

// ──────────────────────────────────────────────
// StateStore
// ──────────────────────────────────────────────

/// Read-only snapshot access to entity states, keyed by entity id.
///
/// Returns an owned snapshot so callers never hold a reference into a
/// store that changes underneath them.
pub trait StateStore: Send + Sync {
    fn get(&self, entity_id: &str) -> Option<EntityState>;
}

/// An in-memory state store backed by a mutable map. Used by tests and the
/// simulation CLI; the production store is the dashboard backend.
#[derive(Debug, Default)]
pub struct StaticStateStore {
    states: Mutex<HashMap<String, EntityState>>,
}

impl StaticStateStore {
    pub fn new() -> Self {
        StaticStateStore::default()
    }

    pub fn from_states(states: HashMap<String, EntityState>) -> Self {
        StaticStateStore {
            states: Mutex::new(states),
        }
    }

    pub fn insert(&self, entity_id: impl Into<String>, state: EntityState) {
        self.states.lock().unwrap().insert(entity_id.into(), state);
    }

    pub fn remove(&self, entity_id: &str) {
        self.states.lock().unwrap().remove(entity_id);
    }
}

impl StateStore for StaticStateStore {
    fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.states.lock().unwrap().get(entity_id).cloned()
    }
}

// ──────────────────────────────────────────────
// Clock
// ──────────────────────────────────────────────

/// Wall-clock source, abstracted so time-extrapolating derivations are
/// testable with a fixed instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock(Mutex<OffsetDateTime>);

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        FixedClock(Mutex::new(now))
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock().unwrap()
    }
}

/// Parse an RFC 3339 timestamp as delivered by the backend.
pub(crate) fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok()
}

/// Shared trait-object handles used by [`RemoteElement`](crate::RemoteElement)
/// and the value tracker's refresh tasks.
pub type SharedStore = Arc<dyn StateStore>;
pub type SharedClock = Arc<dyn Clock>;

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn static_store_returns_snapshot() {
        let store = StaticStateStore::new();
        store.insert(
            "media_player.tv",
            EntityState::new("playing").with_attribute("volume_level", serde_json::json!(0.4)),
        );

        let snap = store.get("media_player.tv").unwrap();
        assert_eq!(snap.state, "playing");
        assert_eq!(snap.attribute("volume_level"), Some(&serde_json::json!(0.4)));
        assert!(store.get("media_player.other").is_none());
    }

    #[test]
    fn entity_state_deserializes_from_backend_json() {
        let snap: EntityState = serde_json::from_value(serde_json::json!({
            "state": "active",
            "attributes": { "duration": "0:01:00" },
            "last_updated": "2026-02-24T12:00:00Z",
        }))
        .unwrap();
        assert_eq!(snap.state, "active");
        assert_eq!(snap.last_updated.as_deref(), Some("2026-02-24T12:00:00Z"));
    }

    #[test]
    fn fixed_clock_is_settable() {
        let clock = FixedClock::new(datetime!(2026-02-24 12:00:00 UTC));
        assert_eq!(clock.now(), datetime!(2026-02-24 12:00:00 UTC));
        clock.set(datetime!(2026-02-24 12:00:05 UTC));
        assert_eq!(clock.now(), datetime!(2026-02-24 12:00:05 UTC));
    }

    #[test]
    fn timestamp_parsing() {
        assert!(parse_timestamp("2026-02-24T12:00:00Z").is_some());
        assert!(parse_timestamp("2026-02-24T12:00:00+01:00").is_some());
        assert!(parse_timestamp("not a timestamp").is_none());
    }
}
