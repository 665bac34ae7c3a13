//! Append-only id queues with tombstone deletion and a persisted
//! starting index.
//!
//! A queue never renumbers: deleting slot `i` writes the zero tombstone, and
//! scans skip it. The persisted starting index marks the first slot that
//! might still be relevant; it only ever moves forward, which is what makes
//! repeated cleanup scans amortized O(1) per stale entry.

use crate::{KeyValueStore, Pointer, StorageKey, packing};
use satpool_types::TokenId;

/// Reserved index space at the top of the u64 range for queue metadata.
const LEN_SLOT: u64 = u64::MAX;
const START_SLOT: u64 = u64::MAX - 1;

/// Handle to one persisted queue of 32-byte ids. Holds no state of its own;
/// every access goes through the store so concurrent handles stay coherent.
#[derive(Debug, Clone, Copy)]
pub struct SlotQueue {
    pointer: Pointer,
    token: TokenId,
    /// Extra discriminator for per-block lists (0 for the provider queues).
    scope: u64,
}

impl SlotQueue {
    /// Handle to a per-token queue (provider queues).
    #[must_use]
    pub fn new(pointer: Pointer, token: TokenId) -> Self {
        Self {
            pointer,
            token,
            scope: 0,
        }
    }

    /// Handle to a per-(token, block) list (active reservations of a block).
    #[must_use]
    pub fn scoped(pointer: Pointer, token: TokenId, scope: u64) -> Self {
        Self {
            pointer,
            token,
            scope,
        }
    }

    fn key(&self, index: u64) -> StorageKey {
        let mut sub = [0u8; 32];
        sub[24..32].copy_from_slice(&self.scope.to_be_bytes());
        StorageKey::entity_indexed(self.pointer, self.token, sub, index)
    }

    /// Key of an element slot; the top two indices are metadata, never
    /// elements.
    fn element_key(&self, index: u64) -> StorageKey {
        debug_assert!(index < START_SLOT, "queue index collides with metadata");
        self.key(index)
    }

    /// Number of slots ever appended (tombstones included).
    pub fn len<S: KeyValueStore>(&self, store: &S) -> u64 {
        store.get_u64(&self.key(LEN_SLOT))
    }

    /// Whether the queue has no slots at all.
    pub fn is_empty<S: KeyValueStore>(&self, store: &S) -> bool {
        self.len(store) == 0
    }

    /// Persisted starting index: first slot that might still be relevant.
    pub fn starting_index<S: KeyValueStore>(&self, store: &S) -> u64 {
        store.get_u64(&self.key(START_SLOT))
    }

    /// Persist a new starting index. Callers must only move it forward.
    pub fn set_starting_index<S: KeyValueStore>(&self, store: &mut S, index: u64) {
        store.set_u64(&self.key(START_SLOT), index);
    }

    /// Append an id; returns the slot it landed in.
    pub fn push<S: KeyValueStore>(&self, store: &mut S, id: [u8; 32]) -> u64 {
        let slot = self.len(store);
        store.set(&self.element_key(slot), packing::pack_id(id));
        store.set_u64(&self.key(LEN_SLOT), slot + 1);
        slot
    }

    /// Read the id at a slot; the zero id is the tombstone.
    pub fn get<S: KeyValueStore>(&self, store: &S, slot: u64) -> [u8; 32] {
        packing::unpack_id(store.get(&self.element_key(slot)))
    }

    /// Tombstone a slot without renumbering.
    pub fn tombstone<S: KeyValueStore>(&self, store: &mut S, slot: u64) {
        store.set(&self.element_key(slot), alloy_primitives::U256::ZERO);
    }
}
