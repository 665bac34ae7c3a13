//! The three-tier provider queue engine.
//!
//! Owns the priority, standard, and removal queues plus the BTC-owed ledger
//! used by removal-queue accounting. Each queue has a **persisted starting
//! index** (only ever moves forward) and a **transient cursor** re-derived
//! from it at the start of each call and advanced monotonically while
//! candidates are rejected. A caller building one reservation calls
//! [`ProviderManager::next_provider_with_liquidity`] repeatedly and receives
//! strictly increasing slots until the scan is exhausted.

use satpool_store::{KeyValueStore, Pointer, SlotQueue, StorageKey, TokenVault};
use satpool_types::{
    ProviderId, QueueKind, QueueSettings, Result, SatpoolError, TokenId, constants,
    tokens_to_satoshis,
};

use crate::provider::ProviderArena;
use alloy_primitives::U256;

/// A provider accepted by the queue scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: ProviderId,
    /// Queue slot, or [`constants::BOOTSTRAP_SLOT`] for the bootstrap
    /// provider.
    pub slot: u64,
    pub queue: QueueKind,
}

/// Queue engine for one token's provider queues.
#[derive(Debug)]
pub struct ProviderManager {
    token: TokenId,
    settings: QueueSettings,
    priority: SlotQueue,
    standard: SlotQueue,
    removal: SlotQueue,
    // Transient cursors; None until derived from the starting index.
    cursor_priority: Option<u64>,
    cursor_standard: Option<u64>,
    cursor_removal: Option<u64>,
    bootstrap_returned: bool,
    initial_provider: ProviderId,
    swept_dust: u128,
}

impl ProviderManager {
    #[must_use]
    pub fn new(token: TokenId, settings: QueueSettings) -> Self {
        Self {
            token,
            settings,
            priority: SlotQueue::new(Pointer::PriorityQueue, token),
            standard: SlotQueue::new(Pointer::StandardQueue, token),
            removal: SlotQueue::new(Pointer::RemovalQueue, token),
            cursor_priority: None,
            cursor_standard: None,
            cursor_removal: None,
            bootstrap_returned: false,
            initial_provider: ProviderId::EMPTY,
            swept_dust: 0,
        }
    }

    /// Register the bootstrap provider (set once by the pool header load).
    pub fn set_initial_provider(&mut self, id: ProviderId) {
        self.initial_provider = id;
    }

    #[must_use]
    pub fn initial_provider(&self) -> ProviderId {
        self.initial_provider
    }

    fn queue(&self, kind: QueueKind) -> SlotQueue {
        match kind {
            QueueKind::Priority => self.priority,
            QueueKind::Standard => self.standard,
            QueueKind::Removal => self.removal,
        }
    }

    /// Starting index with the corruption guard: an index beyond the queue
    /// length means the persisted cursor outran actual content.
    fn checked_starting_index<S: KeyValueStore>(
        &self,
        store: &S,
        kind: QueueKind,
    ) -> Result<u64> {
        let queue = self.queue(kind);
        let starting = queue.starting_index(store);
        let len = queue.len(store);
        if starting > len {
            return Err(SatpoolError::StartingIndexBeyondLength {
                queue: kind,
                starting,
                len,
            });
        }
        Ok(starting)
    }

    /// Drop all transient cursors so the next scan re-derives them from the
    /// persisted starting indices. Called after a purge pass restored
    /// allocations, since eviction may have changed which slots are valid.
    pub fn reset_cursors(&mut self) {
        self.cursor_priority = None;
        self.cursor_standard = None;
        self.cursor_removal = None;
        self.bootstrap_returned = false;
    }

    /// Whether any transient cursor is currently derived.
    #[must_use]
    pub fn cursors_derived(&self) -> bool {
        self.cursor_priority.is_some()
            || self.cursor_standard.is_some()
            || self.cursor_removal.is_some()
    }

    fn cursor<S: KeyValueStore>(&mut self, store: &S, kind: QueueKind) -> Result<u64> {
        let slot = match kind {
            QueueKind::Priority => &mut self.cursor_priority,
            QueueKind::Standard => &mut self.cursor_standard,
            QueueKind::Removal => &mut self.cursor_removal,
        };
        if let Some(position) = *slot {
            return Ok(position);
        }
        let derived = self.checked_starting_index(store, kind)?;
        match kind {
            QueueKind::Priority => self.cursor_priority = Some(derived),
            QueueKind::Standard => self.cursor_standard = Some(derived),
            QueueKind::Removal => self.cursor_removal = Some(derived),
        }
        Ok(derived)
    }

    fn set_cursor(&mut self, kind: QueueKind, position: u64) {
        match kind {
            QueueKind::Priority => self.cursor_priority = Some(position),
            QueueKind::Standard => self.cursor_standard = Some(position),
            QueueKind::Removal => self.cursor_removal = Some(position),
        }
    }

    /// Append a provider to a queue; returns its slot.
    pub fn enqueue<S: KeyValueStore>(
        &self,
        store: &mut S,
        id: ProviderId,
        kind: QueueKind,
    ) -> u64 {
        self.queue(kind).push(store, *id.as_bytes())
    }

    /// Resolve the id at a queue slot.
    pub fn provider_at<S: KeyValueStore>(
        &self,
        store: &S,
        kind: QueueKind,
        slot: u64,
    ) -> ProviderId {
        ProviderId(self.queue(kind).get(store, slot))
    }

    /// Linear search for a provider's slot, from the starting index. Queue
    /// cleanup keeps this short; the slot is transient state re-resolved per
    /// call rather than persisted.
    pub fn find_slot<S: KeyValueStore>(
        &self,
        store: &S,
        kind: QueueKind,
        id: ProviderId,
    ) -> Option<u64> {
        let queue = self.queue(kind);
        let len = queue.len(store);
        (queue.starting_index(store)..len).find(|&slot| queue.get(store, slot) == *id.as_bytes())
    }

    /// Tombstone a slot in a queue.
    pub fn tombstone<S: KeyValueStore>(&self, store: &mut S, kind: QueueKind, slot: u64) {
        self.queue(kind).tombstone(store, slot);
    }

    // ------------------------------------------------------------------
    // BTC-owed ledger (removal-queue accounting)
    // ------------------------------------------------------------------

    /// Satoshi debt the pool owes a withdrawing provider.
    pub fn btc_owed<S: KeyValueStore>(&self, store: &S, id: ProviderId) -> u64 {
        store.get_u64(&StorageKey::entity(Pointer::BtcOwed, self.token, *id.as_bytes()))
    }

    pub fn set_btc_owed<S: KeyValueStore>(&self, store: &mut S, id: ProviderId, sats: u64) {
        store.set_u64(
            &StorageKey::entity(Pointer::BtcOwed, self.token, *id.as_bytes()),
            sats,
        );
    }

    /// Portion of the debt currently locked by open reservations.
    pub fn btc_owed_reserved<S: KeyValueStore>(&self, store: &S, id: ProviderId) -> u64 {
        store.get_u64(&StorageKey::entity(
            Pointer::BtcOwedReserved,
            self.token,
            *id.as_bytes(),
        ))
    }

    pub fn set_btc_owed_reserved<S: KeyValueStore>(
        &self,
        store: &mut S,
        id: ProviderId,
        sats: u64,
    ) {
        store.set_u64(
            &StorageKey::entity(Pointer::BtcOwedReserved, self.token, *id.as_bytes()),
            sats,
        );
    }

    // ------------------------------------------------------------------
    // Queue cleanup
    // ------------------------------------------------------------------

    /// Advance each queue's starting index past stale entries.
    ///
    /// Standard/priority queues stop at the first *active* provider; the
    /// removal queue stops at the first provider still flagged
    /// `pending_removal`. Every stale slot passed over is tombstoned, so the
    /// index only ever moves forward and repeated scans are amortized O(1)
    /// per stale entry.
    pub fn clean_up_queues<S: KeyValueStore>(
        &mut self,
        store: &mut S,
        arena: &mut ProviderArena,
    ) -> Result<()> {
        for kind in [QueueKind::Priority, QueueKind::Standard] {
            let queue = self.queue(kind);
            let len = queue.len(store);
            let mut index = self.checked_starting_index(store, kind)?;
            while index < len {
                let id = ProviderId(queue.get(store, index));
                if id.is_empty() {
                    index += 1;
                    continue;
                }
                if arena.get_mut(store, id).active {
                    break;
                }
                queue.tombstone(store, index);
                index += 1;
            }
            queue.set_starting_index(store, index);
        }

        let len = self.removal.len(store);
        let mut index = self.checked_starting_index(store, QueueKind::Removal)?;
        while index < len {
            let id = ProviderId(self.removal.get(store, index));
            if id.is_empty() {
                index += 1;
                continue;
            }
            if arena.get_mut(store, id).pending_removal {
                break;
            }
            self.removal.tombstone(store, index);
            index += 1;
        }
        self.removal.set_starting_index(store, index);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Provider selection
    // ------------------------------------------------------------------

    /// Next provider able to back a reservation chunk at the given quote.
    ///
    /// Selection order is fixed and must not be reordered: removal queue,
    /// then priority, then standard, then the bootstrap provider. A zero
    /// quote short-circuits to the bootstrap provider only. Returns `None`
    /// once all sources are exhausted for this call.
    pub fn next_provider_with_liquidity<S: KeyValueStore>(
        &mut self,
        store: &mut S,
        arena: &mut ProviderArena,
        vault: &mut TokenVault,
        quote: U256,
    ) -> Result<Option<Candidate>> {
        if quote.is_zero() {
            return self.bootstrap_candidate(store, arena, quote);
        }

        if let Some(candidate) = self.scan_removal_queue(store, arena)? {
            return Ok(Some(candidate));
        }
        if let Some(candidate) =
            self.scan_listing_queue(store, arena, vault, QueueKind::Priority, quote)?
        {
            return Ok(Some(candidate));
        }
        if let Some(candidate) =
            self.scan_listing_queue(store, arena, vault, QueueKind::Standard, quote)?
        {
            return Ok(Some(candidate));
        }
        self.bootstrap_candidate(store, arena, quote)
    }

    fn scan_removal_queue<S: KeyValueStore>(
        &mut self,
        store: &mut S,
        arena: &mut ProviderArena,
    ) -> Result<Option<Candidate>> {
        let len = self.removal.len(store);
        let mut index = self.cursor(store, QueueKind::Removal)?;
        while index < len {
            let id = ProviderId(self.removal.get(store, index));
            if id.is_empty() {
                index += 1;
                continue;
            }
            let (pending, is_lp) = {
                let p = arena.get_mut(store, id);
                (p.pending_removal, p.is_lp)
            };
            if !pending {
                // Self-healing: a settled-out provider left in the queue is
                // dropped as a side effect of the scan.
                tracing::debug!(%id, slot = index, "dropping settled provider from removal queue");
                self.removal.tombstone(store, index);
                index += 1;
                continue;
            }
            if !is_lp {
                index += 1;
                continue;
            }
            let owed = self.btc_owed(store, id);
            let owed_reserved = self.btc_owed_reserved(store, id);
            if owed_reserved > owed {
                return Err(SatpoolError::OwedReservedExceedsOwed(id));
            }
            if owed - owed_reserved >= self.settings.strict_minimum_sats {
                self.set_cursor(QueueKind::Removal, index + 1);
                arena.get_mut(store, id).queue_slot = Some(index);
                return Ok(Some(Candidate {
                    id,
                    slot: index,
                    queue: QueueKind::Removal,
                }));
            }
            index += 1;
        }
        self.set_cursor(QueueKind::Removal, index);
        Ok(None)
    }

    fn scan_listing_queue<S: KeyValueStore>(
        &mut self,
        store: &mut S,
        arena: &mut ProviderArena,
        vault: &mut TokenVault,
        kind: QueueKind,
        quote: U256,
    ) -> Result<Option<Candidate>> {
        let queue = self.queue(kind);
        let len = queue.len(store);
        let mut index = self.cursor(store, kind)?;
        while index < len {
            let id = ProviderId(queue.get(store, index));
            if id.is_empty() {
                index += 1;
                continue;
            }
            let (active, priority, liquidity, reserved) = {
                let p = arena.get_mut(store, id);
                (p.active, p.priority, p.liquidity, p.reserved)
            };
            if !active {
                index += 1;
                continue;
            }
            // A provider of the wrong class in this queue is corruption, not
            // a rejection.
            let class_ok = match kind {
                QueueKind::Priority => priority,
                QueueKind::Standard => !priority,
                QueueKind::Removal => unreachable!("listing scan never walks the removal queue"),
            };
            if !class_ok {
                return Err(SatpoolError::QueueClassMismatch {
                    queue: kind,
                    provider: id,
                });
            }
            if reserved > liquidity {
                return Err(SatpoolError::ReservedExceedsLiquidity(id));
            }
            let available = liquidity - reserved;
            if tokens_to_satoshis(available, quote) >= self.settings.strict_minimum_sats {
                self.set_cursor(kind, index + 1);
                arena.get_mut(store, id).queue_slot = Some(index);
                return Ok(Some(Candidate {
                    id,
                    slot: index,
                    queue: kind,
                }));
            }
            if reserved == 0 {
                // Dust listing with nothing locked: sweep it and keep going.
                tracing::debug!(%id, slot = index, "evicting dust provider");
                arena.get_mut(store, id).queue_slot = Some(index);
                let burned = self.reset_provider(store, arena, vault, id, true)?;
                self.swept_dust += burned;
            }
            index += 1;
        }
        self.set_cursor(kind, index);
        Ok(None)
    }

    fn bootstrap_candidate<S: KeyValueStore>(
        &mut self,
        store: &mut S,
        arena: &mut ProviderArena,
        quote: U256,
    ) -> Result<Option<Candidate>> {
        if self.bootstrap_returned || self.initial_provider.is_empty() {
            return Ok(None);
        }
        let id = self.initial_provider;
        let (liquidity, reserved) = {
            let p = arena.get_mut(store, id);
            (p.liquidity, p.reserved)
        };
        if reserved > liquidity {
            return Err(SatpoolError::ReservedExceedsLiquidity(id));
        }
        let available = liquidity - reserved;
        if available == 0 {
            return Ok(None);
        }
        if !quote.is_zero()
            && tokens_to_satoshis(available, quote) < self.settings.strict_minimum_sats
        {
            return Ok(None);
        }
        self.bootstrap_returned = true;
        Ok(Some(Candidate {
            id,
            slot: constants::BOOTSTRAP_SLOT,
            queue: QueueKind::Standard,
        }))
    }

    // ------------------------------------------------------------------
    // Provider eviction
    // ------------------------------------------------------------------

    /// Evict a provider: optionally burn its unlisted remainder to the dead
    /// address, tombstone its non-removal queue slot, and zero every field.
    /// Returns the burned token amount so the pool can shrink its reserves.
    ///
    /// The bootstrap provider is exempt from queue rules and can never be
    /// reset.
    pub fn reset_provider<S: KeyValueStore>(
        &self,
        store: &mut S,
        arena: &mut ProviderArena,
        vault: &mut TokenVault,
        id: ProviderId,
        burn_remaining: bool,
    ) -> Result<u128> {
        if id == self.initial_provider {
            return Err(SatpoolError::BootstrapProviderImmutable);
        }
        let (liquidity, priority, queue_slot) = {
            let p = arena.get_mut(store, id);
            (p.liquidity, p.priority, p.queue_slot)
        };

        let mut burned = 0u128;
        if burn_remaining && liquidity > 0 {
            vault.transfer(
                self.token,
                satpool_store::vault::POOL_ADDRESS,
                constants::DEAD_ADDRESS,
                liquidity,
            )?;
            burned = liquidity;
        }

        let kind = if priority {
            QueueKind::Priority
        } else {
            QueueKind::Standard
        };
        let slot = queue_slot.or_else(|| self.find_slot(store, kind, id));
        if let Some(slot) = slot {
            self.queue(kind).tombstone(store, slot);
        }

        arena.get_mut(store, id).reset();
        Ok(burned)
    }

    /// Dust burned by evictions since the last take (pool reserves shrink by
    /// this much).
    pub fn take_swept_dust(&mut self) -> u128 {
        std::mem::take(&mut self.swept_dust)
    }
}
