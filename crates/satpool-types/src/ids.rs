//! Deterministic identifiers used throughout Satpool.
//!
//! Every id is a 32-byte digest derived from the entity's natural key with a
//! domain separator, so every validator derives the **exact same** id for the
//! same entity — no randomness anywhere in the persisted state.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Opaque identifier of a listed token. Each liquidity queue instance is
/// keyed by exactly one `TokenId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TokenId(pub [u8; 32]);

impl TokenId {
    /// Derive a token id from its canonical name (test and genesis helper).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"satpool:token:v1:");
        hasher.update(name.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// ProviderId
// ---------------------------------------------------------------------------

/// Identifier of a liquidity provider, derived from its deposit address.
///
/// The all-zero id is the queue slot tombstone ([`ProviderId::EMPTY`]) and is
/// never a valid provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ProviderId(pub [u8; 32]);

impl ProviderId {
    /// The tombstone written into deleted queue slots.
    pub const EMPTY: Self = Self([0u8; 32]);

    /// Derive the provider id from its address string.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"satpool:provider:v1:");
        hasher.update(address.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the slot tombstone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "provider:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// ReservationId
// ---------------------------------------------------------------------------

/// Identifier of a reservation, derived from (token, buyer address).
///
/// The derivation is the "one live reservation per buyer per token" rule:
/// a second reservation by the same buyer maps onto the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReservationId(pub [u8; 32]);

impl ReservationId {
    /// Deterministic id from the token and the buyer address.
    ///
    /// Every node derives the **exact same** id for the same (token, buyer)
    /// pair — critical for cross-validator reproducibility.
    #[must_use]
    pub fn deterministic(token: TokenId, buyer: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"satpool:reservation:v1:");
        hasher.update(token.0);
        hasher.update(buyer.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rsv:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// QueueKind
// ---------------------------------------------------------------------------

/// The three provider queues a reservation chunk can be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueKind {
    /// Providers that paid for priority placement; scanned before standard.
    Priority,
    /// Ordinary listings.
    Standard,
    /// Liquidity providers withdrawing the BTC owed to them.
    Removal,
}

impl QueueKind {
    /// Stable wire encoding used inside packed reservation chunks.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Priority => 0,
            Self::Standard => 1,
            Self::Removal => 2,
        }
    }

    /// Inverse of [`QueueKind::to_u8`]. Returns `None` for unknown tags.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Priority),
            1 => Some(Self::Standard),
            2 => Some(Self::Removal),
            _ => None,
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Priority => write!(f, "PRIORITY"),
            Self::Standard => write!(f, "STANDARD"),
            Self::Removal => write!(f, "REMOVAL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(feature = "test-helpers")]
impl TokenId {
    /// Random token id for fuzz-style tests.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_is_deterministic() {
        let a = ProviderId::from_address("bc1qexample0");
        let b = ProviderId::from_address("bc1qexample0");
        assert_eq!(a, b);
        let c = ProviderId::from_address("bc1qexample1");
        assert_ne!(a, c);
    }

    #[test]
    fn empty_provider_id_is_reserved() {
        assert!(ProviderId::EMPTY.is_empty());
        assert!(!ProviderId::from_address("bc1qexample0").is_empty());
    }

    #[test]
    fn reservation_id_binds_token_and_buyer() {
        let t1 = TokenId::from_name("ORDI");
        let t2 = TokenId::from_name("SATS");
        let same = ReservationId::deterministic(t1, "bc1qbuyer");
        assert_eq!(same, ReservationId::deterministic(t1, "bc1qbuyer"));
        assert_ne!(same, ReservationId::deterministic(t2, "bc1qbuyer"));
        assert_ne!(same, ReservationId::deterministic(t1, "bc1qother"));
    }

    #[test]
    fn queue_kind_tag_roundtrip() {
        for kind in [QueueKind::Priority, QueueKind::Standard, QueueKind::Removal] {
            assert_eq!(QueueKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(QueueKind::from_u8(3), None);
    }

    #[test]
    fn serde_roundtrips() {
        let token = TokenId::from_name("ORDI");
        let json = serde_json::to_string(&token).unwrap();
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);

        let rid = ReservationId::deterministic(token, "bc1qbuyer");
        let json = serde_json::to_string(&rid).unwrap();
        let back: ReservationId = serde_json::from_str(&json).unwrap();
        assert_eq!(rid, back);
    }
}
