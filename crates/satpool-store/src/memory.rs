//! In-memory [`KeyValueStore`] used by tests and the ops crate.
//!
//! Cloning the store is cheap enough to implement all-or-nothing call
//! semantics: operations run against a working copy and the caller commits
//! the copy only on success.

use std::collections::HashMap;

use alloy_primitives::U256;

use crate::{KeyValueStore, StorageKey};

/// HashMap-backed slot storage with zero-default reads.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: HashMap<StorageKey, U256>,
    strings: HashMap<StorageKey, String>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-zero slots held (diagnostic only).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &StorageKey) -> U256 {
        self.slots.get(key).copied().unwrap_or(U256::ZERO)
    }

    fn set(&mut self, key: &StorageKey, value: U256) {
        if value.is_zero() {
            // Writing zero is deletion; keeps the map from accumulating
            // tombstones over the pool's lifetime.
            self.slots.remove(key);
        } else {
            self.slots.insert(*key, value);
        }
    }

    fn get_string(&self, key: &StorageKey) -> String {
        self.strings.get(key).cloned().unwrap_or_default()
    }

    fn set_string(&mut self, key: &StorageKey, value: &str) {
        if value.is_empty() {
            self.strings.remove(key);
        } else {
            self.strings.insert(*key, value.to_string());
        }
    }
}
