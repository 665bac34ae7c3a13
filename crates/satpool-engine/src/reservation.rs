//! Reservation records and the per-block active-reservation list.
//!
//! A reservation is one buyer's claim on slices of provider liquidity,
//! recorded as chunks `(queue, slot, token amount)`. At most one live
//! reservation exists per (token, buyer); its id is derived from that pair.
//! The header packs into a single slot whose all-default encoding means
//! "no reservation", so deletion is a zero write.

use alloy_primitives::U256;
use satpool_store::packing::{PackedChunk, ReservationHeader};
use satpool_store::{KeyValueStore, Pointer, SlotQueue, StorageKey};
use satpool_types::{QueueKind, ReservationId, TokenId};

/// One slice of a reservation against a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub queue: QueueKind,
    /// Slot in the provider queue, or [`satpool_types::constants::BOOTSTRAP_SLOT`].
    pub slot: u64,
    /// Tokens reserved against this provider.
    pub amount: u128,
}

/// A buyer's live reservation for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub token: TokenId,
    pub created_at: u64,
    pub expiration: u64,
    pub activation_delay: u8,
    pub reserved_for_pool: bool,
    pub timeout: bool,
    /// Position in the creation block's active list; checked during purge.
    pub purge_index: u32,
    pub chunks: Vec<Chunk>,
}

impl Reservation {
    fn header_key(token: TokenId, id: ReservationId) -> StorageKey {
        StorageKey::entity(Pointer::ReservationHeader, token, *id.as_bytes())
    }

    fn chunk_key(token: TokenId, id: ReservationId, index: u64) -> StorageKey {
        StorageKey::entity_indexed(Pointer::ReservationChunk, token, *id.as_bytes(), index)
    }

    /// Read a reservation; `None` if the buyer has no live one.
    pub fn load<S: KeyValueStore>(store: &S, token: TokenId, id: ReservationId) -> Option<Self> {
        let header = ReservationHeader::unpack(store.get(&Self::header_key(token, id)))?;
        let mut chunks = Vec::with_capacity(header.chunk_count as usize);
        for index in 0..u64::from(header.chunk_count) {
            if let Some(packed) = PackedChunk::unpack(store.get(&Self::chunk_key(token, id, index)))
            {
                chunks.push(Chunk {
                    queue: packed.queue,
                    slot: packed.slot,
                    amount: packed.amount,
                });
            }
        }
        Some(Self {
            id,
            token,
            created_at: header.created_at,
            expiration: header.expiration,
            activation_delay: header.activation_delay,
            reserved_for_pool: header.reserved_for_pool,
            timeout: header.timeout,
            purge_index: header.purge_index,
            chunks,
        })
    }

    /// Persist the header and every chunk.
    pub fn save<S: KeyValueStore>(&self, store: &mut S) {
        let header = ReservationHeader {
            created_at: self.created_at,
            expiration: self.expiration,
            activation_delay: self.activation_delay,
            reserved_for_pool: self.reserved_for_pool,
            timeout: self.timeout,
            purge_index: self.purge_index,
            chunk_count: u32::try_from(self.chunks.len()).unwrap_or(u32::MAX),
        };
        store.set(&Self::header_key(self.token, self.id), header.pack());
        for (index, chunk) in self.chunks.iter().enumerate() {
            let packed = PackedChunk {
                queue: chunk.queue,
                slot: chunk.slot,
                amount: chunk.amount,
            };
            store.set(
                &Self::chunk_key(self.token, self.id, index as u64),
                packed.pack(),
            );
        }
    }

    /// Revert the reservation's storage to the no-reservation encoding.
    pub fn delete<S: KeyValueStore>(&self, store: &mut S) {
        store.set(&Self::header_key(self.token, self.id), U256::ZERO);
        for index in 0..self.chunks.len() as u64 {
            store.set(&Self::chunk_key(self.token, self.id, index), U256::ZERO);
        }
    }

    /// Tokens this reservation entitles the buyer to.
    #[must_use]
    pub fn total_tokens(&self) -> u128 {
        self.chunks
            .iter()
            .fold(0u128, |sum, c| sum.saturating_add(c.amount))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// A reservation is settleable only before its expiration block.
    #[must_use]
    pub fn is_expired(&self, block: u64) -> bool {
        block >= self.expiration
    }

    /// First block at which settlement is allowed.
    #[must_use]
    pub fn ready_at(&self) -> u64 {
        self.created_at + u64::from(self.activation_delay)
    }

    /// The per-block list of reservations created at `block`, walked by the
    /// purge pass once the block's reservations can no longer be settled.
    #[must_use]
    pub fn active_list(token: TokenId, block: u64) -> SlotQueue {
        SlotQueue::scoped(Pointer::ActiveReservationList, token, block)
    }

    /// Append this reservation to its creation block's active list and record
    /// the assigned purge index.
    pub fn register_active<S: KeyValueStore>(&mut self, store: &mut S) {
        let slot = Self::active_list(self.token, self.created_at).push(store, *self.id.as_bytes());
        self.purge_index = u32::try_from(slot).unwrap_or(u32::MAX);
    }
}
