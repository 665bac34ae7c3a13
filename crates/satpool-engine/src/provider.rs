//! Provider records and the call-scoped provider arena.
//!
//! A provider is created implicitly on first reference to its id and is
//! "deleted" by zeroing every field, never physically removed. All reads and
//! writes go through the [`ProviderArena`], an explicit per-call cache that
//! loads each record once and flushes every dirty record in `save_all` —
//! there is no process-wide provider state.

use alloy_primitives::U256;

use satpool_store::{KeyValueStore, Pointer, StorageKey, packing};
use satpool_types::{ProviderId, TokenId};

const FLAG_ACTIVE: u64 = 1;
const FLAG_PRIORITY: u64 = 1 << 1;
const FLAG_CAN_PROVIDE: u64 = 1 << 2;
const FLAG_IS_LP: u64 = 1 << 3;
const FLAG_PENDING_REMOVAL: u64 = 1 << 4;

/// Per-address mutable provider record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub id: ProviderId,
    /// Tokens listed for sale.
    pub liquidity: u128,
    /// Tokens currently allocated to open reservations (`reserved ≤ liquidity`).
    pub reserved: u128,
    /// Tokens credited when acting as an LP.
    pub liquidity_provided: U256,
    pub active: bool,
    pub priority: bool,
    pub can_provide_liquidity: bool,
    pub is_lp: bool,
    pub pending_removal: bool,
    /// BTC address settlement payments must reach.
    pub btc_receiver: String,
    /// Block the current listing was created in (slashing base).
    pub listed_at: u64,
    /// Queue slot resolved during the current call. Transient, never persisted.
    pub queue_slot: Option<u64>,
}

impl Provider {
    /// Empty record for an id never seen before.
    #[must_use]
    pub fn empty(id: ProviderId) -> Self {
        Self {
            id,
            liquidity: 0,
            reserved: 0,
            liquidity_provided: U256::ZERO,
            active: false,
            priority: false,
            can_provide_liquidity: false,
            is_lp: false,
            pending_removal: false,
            btc_receiver: String::new(),
            listed_at: 0,
            queue_slot: None,
        }
    }

    /// Load a provider record from storage; missing slots decode as zeroes.
    pub fn load<S: KeyValueStore>(store: &S, token: TokenId, id: ProviderId) -> Self {
        let bytes = *id.as_bytes();
        let flags = store.get_u64(&StorageKey::entity(Pointer::ProviderFlags, token, bytes));
        Self {
            id,
            liquidity: store.get_u128(&StorageKey::entity(Pointer::ProviderLiquidity, token, bytes)),
            reserved: store.get_u128(&StorageKey::entity(Pointer::ProviderReserved, token, bytes)),
            liquidity_provided: store.get(&StorageKey::entity(Pointer::ProviderProvided, token, bytes)),
            active: flags & FLAG_ACTIVE != 0,
            priority: flags & FLAG_PRIORITY != 0,
            can_provide_liquidity: flags & FLAG_CAN_PROVIDE != 0,
            is_lp: flags & FLAG_IS_LP != 0,
            pending_removal: flags & FLAG_PENDING_REMOVAL != 0,
            btc_receiver: store
                .get_string(&StorageKey::entity(Pointer::ProviderReceiver, token, bytes)),
            listed_at: store.get_u64(&StorageKey::entity(Pointer::ProviderListedAt, token, bytes)),
            queue_slot: None,
        }
    }

    /// Persist every field. `queue_slot` is transient and deliberately not
    /// written.
    pub fn save<S: KeyValueStore>(&self, store: &mut S, token: TokenId) {
        let bytes = *self.id.as_bytes();
        let mut flags = 0u64;
        if self.active {
            flags |= FLAG_ACTIVE;
        }
        if self.priority {
            flags |= FLAG_PRIORITY;
        }
        if self.can_provide_liquidity {
            flags |= FLAG_CAN_PROVIDE;
        }
        if self.is_lp {
            flags |= FLAG_IS_LP;
        }
        if self.pending_removal {
            flags |= FLAG_PENDING_REMOVAL;
        }
        store.set_u128(
            &StorageKey::entity(Pointer::ProviderLiquidity, token, bytes),
            self.liquidity,
        );
        store.set_u128(
            &StorageKey::entity(Pointer::ProviderReserved, token, bytes),
            self.reserved,
        );
        store.set(
            &StorageKey::entity(Pointer::ProviderProvided, token, bytes),
            self.liquidity_provided,
        );
        store.set_u64(&StorageKey::entity(Pointer::ProviderFlags, token, bytes), flags);
        store.set_u64(
            &StorageKey::entity(Pointer::ProviderListedAt, token, bytes),
            self.listed_at,
        );
        store.set_string(
            &StorageKey::entity(Pointer::ProviderReceiver, token, bytes),
            &self.btc_receiver,
        );
    }

    /// Tokens not yet allocated to any reservation.
    ///
    /// Callers must have verified `reserved ≤ liquidity` (the manager treats
    /// a violation as corruption before ever computing this).
    #[must_use]
    pub fn available(&self) -> u128 {
        self.liquidity.saturating_sub(self.reserved)
    }

    /// Logical deletion: zero every field, keep the id.
    pub fn reset(&mut self) {
        let id = self.id;
        *self = Self::empty(id);
    }
}

/// Call-scoped provider cache.
///
/// Loads each record at most once per call and flushes all of them exactly
/// once in [`ProviderArena::save_all`]. Insertion order is preserved so the
/// flush sequence is deterministic.
#[derive(Debug)]
pub struct ProviderArena {
    token: TokenId,
    cache: std::collections::HashMap<ProviderId, Provider>,
    order: Vec<ProviderId>,
}

impl ProviderArena {
    /// Fresh arena for one call on one token's queue.
    #[must_use]
    pub fn new(token: TokenId) -> Self {
        Self {
            token,
            cache: std::collections::HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Borrow a provider record, loading it from storage on first access.
    pub fn get_mut<S: KeyValueStore>(&mut self, store: &S, id: ProviderId) -> &mut Provider {
        if !self.cache.contains_key(&id) {
            self.cache.insert(id, Provider::load(store, self.token, id));
            self.order.push(id);
        }
        self.cache.get_mut(&id).expect("inserted above")
    }

    /// Read-only view of a record already in the arena.
    #[must_use]
    pub fn peek(&self, id: ProviderId) -> Option<&Provider> {
        self.cache.get(&id)
    }

    /// Flush every cached record, in first-access order.
    pub fn save_all<S: KeyValueStore>(&self, store: &mut S) {
        for id in &self.order {
            if let Some(provider) = self.cache.get(id) {
                provider.save(store, self.token);
            }
        }
    }

    /// Number of records loaded this call (diagnostic only).
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no record has been touched yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satpool_store::MemoryStore;

    fn token() -> TokenId {
        TokenId::from_name("ORDI")
    }

    #[test]
    fn unknown_provider_loads_as_empty() {
        let store = MemoryStore::new();
        let id = ProviderId::from_address("bc1qnew");
        let p = Provider::load(&store, token(), id);
        assert_eq!(p, Provider::empty(id));
    }

    #[test]
    fn save_load_roundtrip() {
        let mut store = MemoryStore::new();
        let id = ProviderId::from_address("bc1qp");
        let mut p = Provider::empty(id);
        p.liquidity = 5_000;
        p.reserved = 1_200;
        p.liquidity_provided = U256::from(77u64);
        p.active = true;
        p.priority = true;
        p.is_lp = true;
        p.btc_receiver = "bc1qreceiver".into();
        p.listed_at = 840_000;
        p.queue_slot = Some(3);
        p.save(&mut store, token());

        let loaded = Provider::load(&store, token(), id);
        assert_eq!(loaded.liquidity, 5_000);
        assert_eq!(loaded.reserved, 1_200);
        assert!(loaded.active && loaded.priority && loaded.is_lp);
        assert!(!loaded.pending_removal && !loaded.can_provide_liquidity);
        assert_eq!(loaded.btc_receiver, "bc1qreceiver");
        assert_eq!(loaded.listed_at, 840_000);
        assert_eq!(loaded.queue_slot, None, "queue slot is transient");
    }

    #[test]
    fn reset_zeroes_everything_but_id() {
        let id = ProviderId::from_address("bc1qp");
        let mut p = Provider::empty(id);
        p.liquidity = 10;
        p.active = true;
        p.btc_receiver = "bc1qx".into();
        p.reset();
        assert_eq!(p, Provider::empty(id));
        assert_eq!(p.id, id);
    }

    #[test]
    fn arena_loads_once_and_flushes_dirty_state() {
        let mut store = MemoryStore::new();
        let id = ProviderId::from_address("bc1qp");
        let mut arena = ProviderArena::new(token());

        arena.get_mut(&store, id).liquidity = 42;
        // Second access sees the cached mutation, not a fresh load.
        assert_eq!(arena.get_mut(&store, id).liquidity, 42);
        assert_eq!(arena.len(), 1);

        arena.save_all(&mut store);
        assert_eq!(Provider::load(&store, token(), id).liquidity, 42);
    }

    #[test]
    fn available_saturates() {
        let mut p = Provider::empty(ProviderId::from_address("bc1qp"));
        p.liquidity = 100;
        p.reserved = 30;
        assert_eq!(p.available(), 70);
        p.reserved = 200; // corrupted state is caught elsewhere; no underflow here
        assert_eq!(p.available(), 0);
    }
}
