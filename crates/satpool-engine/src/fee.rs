//! Dynamic trading-fee curve.
//!
//! The fee in basis points grows with trade size relative to a reference
//! size, with recent quote volatility, and with pool utilization, then is
//! clamped to a configured band. All components are integer math in basis
//! points.

use alloy_primitives::U256;
use satpool_types::{FeeSettings, apply_basis_points, constants};

/// Fee curve evaluator for one pool.
#[derive(Debug, Clone)]
pub struct DynamicFee {
    settings: FeeSettings,
}

impl DynamicFee {
    #[must_use]
    pub fn new(settings: FeeSettings) -> Self {
        Self { settings }
    }

    /// Fee rate in basis points for a trade.
    ///
    /// `trade_size_sats` is the satoshi value of the trade, `volatility_bp`
    /// the recorded pool volatility in basis points, and `utilization_pct`
    /// the reserved-over-total percentage (0..=100).
    #[must_use]
    pub fn fee_bp(&self, trade_size_sats: u64, volatility_bp: u64, utilization_pct: u64) -> u64 {
        let s = &self.settings;
        // Size pressure: zero until the trade exceeds the reference size,
        // then alpha per whole multiple above it.
        let ratio = if s.ref_trade_size == 0 {
            0
        } else {
            u128::from(trade_size_sats) / s.ref_trade_size
        };
        let alpha_component = s
            .alpha
            .saturating_mul(u64::try_from(ratio.saturating_sub(1)).unwrap_or(u64::MAX));
        let beta_component = s.beta.saturating_mul(volatility_bp) / constants::BP_DENOMINATOR;
        let gamma_component = s.gamma.saturating_mul(utilization_pct) / 10;

        let raw = s
            .base_bp
            .saturating_add(alpha_component)
            .saturating_add(beta_component)
            .saturating_add(gamma_component);
        raw.clamp(s.min_bp, s.max_bp)
    }

    /// Token amount charged at `fee_bp` basis points (floor).
    #[must_use]
    pub fn compute_fee_amount(amount: U256, fee_bp: u64) -> U256 {
        apply_basis_points(amount, fee_bp.min(constants::BP_DENOMINATOR))
    }
}

impl Default for DynamicFee {
    fn default() -> Self {
        Self::new(FeeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_calm_trade_at_ten_percent_utilization_is_23bp() {
        let fee = DynamicFee::default();
        // base 20 + gamma 3 * 10% / 10 = 23.
        assert_eq!(fee.fee_bp(1_000, 0, 10), 23);
    }

    #[test]
    fn size_component_kicks_in_above_reference() {
        let fee = DynamicFee::default();
        let reference = u64::try_from(FeeSettings::default().ref_trade_size).unwrap();
        // At or below the reference size the alpha term is zero.
        assert_eq!(fee.fee_bp(reference, 0, 0), 20);
        // Three times the reference adds alpha * (3 - 1) = 40.
        assert_eq!(fee.fee_bp(reference * 3, 0, 0), 60);
    }

    #[test]
    fn volatility_component_scales_with_beta() {
        let fee = DynamicFee::default();
        // beta 15 * 2000bp / 10000 = 3.
        assert_eq!(fee.fee_bp(1_000, 2_000, 0), 23);
    }

    #[test]
    fn clamped_to_band() {
        let fee = DynamicFee::default();
        let reference = u64::try_from(FeeSettings::default().ref_trade_size).unwrap();
        // Enormous trade in a volatile, saturated pool hits the 150bp cap.
        assert_eq!(fee.fee_bp(reference * 100, 10_000, 100), 150);

        let floor = DynamicFee::new(FeeSettings {
            base_bp: 1,
            ..FeeSettings::default()
        });
        assert_eq!(floor.fee_bp(0, 0, 0), 15);
    }

    #[test]
    fn fee_amount_floors() {
        assert_eq!(
            DynamicFee::compute_fee_amount(U256::from(10_000u64), 25),
            U256::from(25u64)
        );
        assert_eq!(
            DynamicFee::compute_fee_amount(U256::from(399u64), 25),
            U256::ZERO
        );
    }
}
