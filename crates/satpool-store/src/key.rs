//! Storage key namespacing.
//!
//! Every persisted slot is addressed by (pointer byte, token, 32-byte
//! sub-key, 64-bit index). The pointer byte partitions the keyspace by
//! record family; the token scopes each family to one liquidity queue
//! instance. Families that need neither sub-key nor index leave them zero.

use satpool_types::TokenId;

/// Record families of the persisted state. The discriminant is the pointer
/// byte and is part of the storage layout — append only, never reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pointer {
    // Pool header -----------------------------------------------------
    VirtualBtcReserve = 1,
    VirtualTokenReserve = 2,
    DeltaTokensAdd = 3,
    DeltaBtcBuy = 4,
    DeltaTokensBuy = 5,
    DeltaTokensSell = 6,
    LastVirtualUpdateBlock = 7,
    TotalReserves = 8,
    TotalReserved = 9,
    InitialProvider = 10,
    AntibotCap = 11,
    AntibotExpiry = 12,
    LastPurgedBlock = 13,
    Volatility = 14,
    QuoteRing = 15,
    // Provider records ------------------------------------------------
    ProviderLiquidity = 30,
    ProviderReserved = 31,
    ProviderProvided = 32,
    ProviderFlags = 33,
    ProviderListedAt = 34,
    ProviderReceiver = 35,
    BtcOwed = 37,
    BtcOwedReserved = 38,
    // Queues ----------------------------------------------------------
    PriorityQueue = 50,
    StandardQueue = 51,
    RemovalQueue = 52,
    ActiveReservationList = 53,
    // Reservations ----------------------------------------------------
    ReservationHeader = 70,
    ReservationChunk = 71,
    BuyerTimeout = 72,
}

/// Fully-qualified address of one storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub pointer: Pointer,
    pub token: TokenId,
    pub sub: [u8; 32],
    pub index: u64,
}

impl StorageKey {
    /// Key of a per-pool singleton slot.
    #[must_use]
    pub fn pool(pointer: Pointer, token: TokenId) -> Self {
        Self {
            pointer,
            token,
            sub: [0u8; 32],
            index: 0,
        }
    }

    /// Key of a slot scoped to a 32-byte entity id (provider, reservation).
    #[must_use]
    pub fn entity(pointer: Pointer, token: TokenId, id: [u8; 32]) -> Self {
        Self {
            pointer,
            token,
            sub: id,
            index: 0,
        }
    }

    /// Key of an indexed slot (quote ring, queue element, block list).
    #[must_use]
    pub fn indexed(pointer: Pointer, token: TokenId, index: u64) -> Self {
        Self {
            pointer,
            token,
            sub: [0u8; 32],
            index,
        }
    }

    /// Key of an indexed slot under an entity (reservation chunk i).
    #[must_use]
    pub fn entity_indexed(pointer: Pointer, token: TokenId, id: [u8; 32], index: u64) -> Self {
        Self {
            pointer,
            token,
            sub: id,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_partition_by_family_and_token() {
        let t1 = TokenId::from_name("ORDI");
        let t2 = TokenId::from_name("SATS");
        assert_ne!(
            StorageKey::pool(Pointer::TotalReserves, t1),
            StorageKey::pool(Pointer::TotalReserved, t1)
        );
        assert_ne!(
            StorageKey::pool(Pointer::TotalReserves, t1),
            StorageKey::pool(Pointer::TotalReserves, t2)
        );
    }

    #[test]
    fn indexed_keys_are_distinct() {
        let token = TokenId::from_name("ORDI");
        let a = StorageKey::indexed(Pointer::QuoteRing, token, 1);
        let b = StorageKey::indexed(Pointer::QuoteRing, token, 2);
        assert_ne!(a, b);
    }
}
