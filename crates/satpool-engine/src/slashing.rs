//! Penalty curve for liquidity withdrawn shortly after listing.
//!
//! Early exits forfeit part of their position back to the pool. The penalty
//! is 50% within the grace window, then ramps linearly from 50% to a 90% cap
//! over the ramp-up window. Measured in blocks since the provider's
//! `listed_at` height.

use alloy_primitives::U256;
use satpool_types::{QueueSettings, apply_basis_points, constants};

/// Portion of `amount` forfeited when withdrawing `elapsed` blocks after
/// listing. Never exceeds `amount`.
#[must_use]
pub fn slash_penalty(amount: U256, elapsed: u64, settings: &QueueSettings) -> U256 {
    if amount.is_zero() {
        return U256::ZERO;
    }
    if elapsed < settings.slash_grace_blocks {
        return amount >> 1;
    }
    let past_grace = elapsed - settings.slash_grace_blocks;
    let ramp = past_grace
        .saturating_mul(constants::SLASH_RAMP_BP)
        .checked_div(settings.slash_ramp_up_blocks)
        .unwrap_or(constants::SLASH_RAMP_BP);
    let bp = (constants::SLASH_BASE_BP + ramp).min(constants::SLASH_CAP_BP);
    apply_basis_points(amount, bp)
}
