//! The host's persistent key-value contract.

use alloy_primitives::U256;

use crate::StorageKey;

/// Persistent slot storage provided by the host environment.
///
/// The contract mirrors on-chain storage semantics: a slot that was never
/// written reads as zero, and writing zero is indistinguishable from
/// deletion. String slots exist only for provider receiving addresses, which
/// the host stores out-of-band; a missing string reads as empty.
pub trait KeyValueStore {
    /// Read a slot; missing keys return zero.
    fn get(&self, key: &StorageKey) -> U256;

    /// Write a slot.
    fn set(&mut self, key: &StorageKey, value: U256);

    /// Read a string slot; missing keys return the empty string.
    fn get_string(&self, key: &StorageKey) -> String;

    /// Write a string slot.
    fn set_string(&mut self, key: &StorageKey, value: &str);

    /// Convenience: read a slot as u64 (low limb; persisted values in these
    /// families never exceed 64 bits).
    fn get_u64(&self, key: &StorageKey) -> u64 {
        self.get(key).saturating_to::<u64>()
    }

    /// Convenience: write a u64 slot.
    fn set_u64(&mut self, key: &StorageKey, value: u64) {
        self.set(key, U256::from(value));
    }

    /// Convenience: read a slot as u128.
    fn get_u128(&self, key: &StorageKey) -> u128 {
        self.get(key).saturating_to::<u128>()
    }

    /// Convenience: write a u128 slot.
    fn set_u128(&mut self, key: &StorageKey, value: u128) {
        self.set(key, U256::from(value));
    }
}
