//! Structured events emitted by the engine, one per state transition.
//!
//! Events are fixed-layout payloads handed to the host's event sink; they are
//! the only observable output of a call besides the state itself, so their
//! field order is part of the deterministic surface.

use serde::{Deserialize, Serialize};

use crate::{ProviderId, ReservationId, TokenId};

/// Every event the engine can emit, in the order operations produce them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    /// A new pool was bootstrapped for a token.
    PoolCreated {
        token: TokenId,
        initial_liquidity: u128,
        floor_quote: u128,
    },
    /// A provider listed tokens for sale.
    LiquidityListed {
        token: TokenId,
        provider: ProviderId,
        amount: u128,
        priority: bool,
    },
    /// A buyer reserved liquidity across one or more providers.
    LiquidityReserved {
        token: TokenId,
        reservation: ReservationId,
        tokens_reserved: u128,
        expected_sats: u64,
    },
    /// The reservation record itself was written.
    ReservationCreated {
        token: TokenId,
        reservation: ReservationId,
        expiration_block: u64,
        activation_delay: u8,
    },
    /// A reservation settled through `Swap`.
    SwapExecuted {
        token: TokenId,
        buyer: ProviderId,
        tokens_out: u128,
        sats_in: u64,
        fee_tokens: u128,
    },
    /// A reservation settled into a liquidity-provider position.
    LiquidityAdded {
        token: TokenId,
        provider: ProviderId,
        tokens: u128,
        sats_contributed: u64,
    },
    /// A liquidity provider started withdrawing its BTC.
    LiquidityRemoved {
        token: TokenId,
        provider: ProviderId,
        sats_owed: u64,
        tokens_returned: u128,
    },
    /// A listing was canceled early and slashed.
    ListingCanceled {
        token: TokenId,
        provider: ProviderId,
        refunded: u128,
        penalty: u128,
    },
    /// A reservation expired and its allocations were restored. The buyer is
    /// flagged with a timeout marker.
    ReservationPurged {
        token: TokenId,
        reservation: ReservationId,
        block: u64,
    },
}

impl PoolEvent {
    /// Stable event name, used by hosts that index events by name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PoolCreated { .. } => "PoolCreated",
            Self::LiquidityListed { .. } => "LiquidityListed",
            Self::LiquidityReserved { .. } => "LiquidityReserved",
            Self::ReservationCreated { .. } => "ReservationCreated",
            Self::SwapExecuted { .. } => "SwapExecuted",
            Self::LiquidityAdded { .. } => "LiquidityAdded",
            Self::LiquidityRemoved { .. } => "LiquidityRemoved",
            Self::ListingCanceled { .. } => "ListingCanceled",
            Self::ReservationPurged { .. } => "ReservationPurged",
        }
    }
}
