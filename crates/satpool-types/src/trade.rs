//! Transient result of settling one reservation.

use serde::{Deserialize, Serialize};

/// Totals accumulated while settling a reservation's chunks. Never persisted.
///
/// Purchased totals cover every paid chunk, removal-queue chunks included.
/// Refunded totals are what settlement released rather than what the buyer
/// receives: tokens that went back to their providers because the chunk was
/// unpaid or only partly paid, and satoshis sent to touched receivers beyond
/// what settlement consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTrade {
    /// Sum of the chunk amounts the reservation held before settlement.
    pub tokens_reserved: u128,
    /// Tokens bought across all settled chunks.
    pub total_tokens_purchased: u128,
    /// Satoshis settlement consumed paying providers.
    pub total_satoshis_spent: u64,
    /// Satoshi overpayment: outputs to touched receivers minus consumed.
    pub total_refunded_btc: u64,
    /// Reserved tokens released back to their providers unpurchased.
    pub total_tokens_refunded: u128,
}

impl CompletedTrade {
    /// Whether the settlement consumed any payment at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_satoshis_spent == 0
    }
}
