//! Configuration types for Satpool queues and the fee curve.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Coefficients of the dynamic fee curve.
///
/// `fee_bp = clamp(base + alpha·(size/ref − 1) + beta·vol/10000 + gamma·util/10, min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSettings {
    /// Base fee in basis points.
    pub base_bp: u64,
    /// Lower clamp in basis points.
    pub min_bp: u64,
    /// Upper clamp in basis points.
    pub max_bp: u64,
    /// Trade-size coefficient.
    pub alpha: u64,
    /// Volatility coefficient.
    pub beta: u64,
    /// Utilization coefficient.
    pub gamma: u64,
    /// Reference trade size for the alpha component, in satoshis.
    pub ref_trade_size: u128,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            base_bp: constants::DEFAULT_BASE_FEE_BP,
            min_bp: constants::DEFAULT_MIN_FEE_BP,
            max_bp: constants::DEFAULT_MAX_FEE_BP,
            alpha: constants::DEFAULT_FEE_ALPHA,
            beta: constants::DEFAULT_FEE_BETA,
            gamma: constants::DEFAULT_FEE_GAMMA,
            ref_trade_size: constants::DEFAULT_REF_TRADE_SIZE,
        }
    }
}

/// Per-token queue tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Blocks a reservation stays settleable before it expires.
    pub reservation_expire_after: u64,
    /// Upper bound on a reservation's activation delay.
    pub max_activation_delay: u8,
    /// Smallest settlement-currency value a chunk may represent.
    pub strict_minimum_sats: u64,
    /// Lookback for the volatility estimate, in blocks.
    pub volatility_window: u64,
    /// Grace window of the slashing curve, in blocks.
    pub slash_grace_blocks: u64,
    /// Ramp-up window of the slashing curve, in blocks.
    pub slash_ramp_up_blocks: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            reservation_expire_after: constants::RESERVATION_EXPIRE_AFTER,
            max_activation_delay: constants::MAX_ACTIVATION_DELAY,
            strict_minimum_sats: constants::STRICT_MINIMUM_RESERVATION_SATS,
            volatility_window: constants::VOLATILITY_WINDOW_BLOCKS,
            slash_grace_blocks: constants::SLASH_GRACE_BLOCKS,
            slash_ramp_up_blocks: constants::SLASH_RAMP_UP_BLOCKS,
        }
    }
}
