//! Display state persistence
//!
//! The last-shown timestamp of each popup lives in a string-to-string
//! key-value store scoped to the browser (`localStorage` in production).
//! Storage problems never stop a popup from working: failed reads count as
//! "never shown" and failed writes are logged and dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Error type for key-value store access.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to read '{key}': {reason}")]
    Read { key: String, reason: String },
    #[error("Failed to write '{key}': {reason}")]
    Write { key: String, reason: String },
}

/// String key-value storage, as exposed by the browser.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store, used for previews, tests and the CLI state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// Display State
// =============================================================================

/// What the store says about a popup that has an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastShown {
    At(Timestamp),
    /// An entry exists but does not hold a timestamp.
    Unreadable,
}

/// Per-popup last-shown timestamps on top of a key-value store.
#[derive(Debug, Clone, Default)]
pub struct DisplayState<S> {
    store: S,
}

impl<S: KeyValueStore> DisplayState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Look up the last time the popup owning `key` was shown.
    ///
    /// Returns `None` when the key is absent, empty, or the store cannot be read.
    pub fn last_shown(&self, key: &str) -> Option<LastShown> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("{}; treating '{}' as never shown", e, key);
                return None;
            }
        };

        if raw.is_empty() {
            return None;
        }

        Some(match parse_timestamp(&raw) {
            Some(ts) => LastShown::At(ts),
            None => LastShown::Unreadable,
        })
    }

    /// Record that the popup owning `key` was shown or dismissed at `now`.
    pub fn record_shown(&mut self, key: &str, now: Timestamp) {
        if let Err(e) = self.try_record_shown(key, now) {
            log::warn!("{}; popup may be shown again", e);
        }
    }

    /// Like [`record_shown`](Self::record_shown), but hands the write error back.
    pub fn try_record_shown(&mut self, key: &str, now: Timestamp) -> Result<(), StorageError> {
        self.store.set(key, &now.to_string())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Parse a stored timestamp the lenient way browsers parse integers:
/// leading whitespace and an optional sign, then as many digits as present.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value: Timestamp = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Read {
                key: key.to_string(),
                reason: "SecurityError".to_string(),
            })
        }

        fn set(&mut self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Write {
                key: key.to_string(),
                reason: "QuotaExceededError".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp("  42abc"), Some(42));
        assert_eq!(parse_timestamp("-5"), Some(-5));
        assert_eq!(parse_timestamp("true"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("-"), None);
    }

    #[test]
    fn test_absent_key() {
        let state = DisplayState::new(MemoryStore::new());
        assert_eq!(state.last_shown("k1"), None);
    }

    #[test]
    fn test_record_then_read() {
        let mut state = DisplayState::new(MemoryStore::new());
        state.record_shown("k1", 1_700_000_000_000);
        assert_eq!(state.last_shown("k1"), Some(LastShown::At(1_700_000_000_000)));
        assert_eq!(state.store().get("k1").unwrap().as_deref(), Some("1700000000000"));

        state.record_shown("k1", 1_700_000_000_500);
        assert_eq!(state.last_shown("k1"), Some(LastShown::At(1_700_000_000_500)));
        assert_eq!(state.store().len(), 1);
    }

    #[test]
    fn test_legacy_value_is_unreadable() {
        let store: MemoryStore = [("k1", "true")].into_iter().collect();
        let state = DisplayState::new(store);
        assert_eq!(state.last_shown("k1"), Some(LastShown::Unreadable));
    }

    #[test]
    fn test_empty_value_is_absent() {
        let store: MemoryStore = [("k1", "")].into_iter().collect();
        let state = DisplayState::new(store);
        assert_eq!(state.last_shown("k1"), None);
    }

    #[test]
    fn test_broken_store_is_non_fatal() {
        let mut state = DisplayState::new(BrokenStore);
        assert_eq!(state.last_shown("k1"), None);
        state.record_shown("k1", 1);
        assert!(matches!(state.try_record_shown("k1", 1), Err(StorageError::Write { .. })));
    }

    #[test]
    fn test_memory_store_json() {
        let store: MemoryStore = [("a_shown", "1")].into_iter().collect();
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"a_shown":"1"}"#);
        let back: MemoryStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
