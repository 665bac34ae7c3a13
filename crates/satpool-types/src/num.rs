//! Integer conversion math between satoshis and token base units.
//!
//! All arithmetic is 256-bit, floor-rounded, and free of floating point —
//! every validator must reproduce these values bit-for-bit. A quote is the
//! fixed-point token price of one satoshi scaled by [`constants::QUOTE_SCALE`]:
//! `quote = T · SCALE / B` over the virtual reserves.

use alloy_primitives::U256;

use crate::constants::QUOTE_SCALE;

/// Convert satoshis to token base units at the given quote, rounding down.
///
/// Saturates at `u128::MAX` rather than wrapping; amounts beyond that hold no
/// meaning for a 128-bit token supply.
#[must_use]
pub fn satoshis_to_tokens(sats: u64, quote: U256) -> u128 {
    // A product that overflows 256 bits is already beyond the token space
    // after the SCALE division, so it saturates either way.
    let Some(product) = U256::from(sats).checked_mul(quote) else {
        return u128::MAX;
    };
    (product / U256::from(QUOTE_SCALE)).saturating_to::<u128>()
}

/// Convert token base units to satoshis at the given quote, rounding down.
///
/// Returns 0 when the quote is zero (an unpriced pool has no settlement
/// value). Saturates at `u64::MAX`.
#[must_use]
pub fn tokens_to_satoshis(tokens: u128, quote: U256) -> u64 {
    if quote.is_zero() {
        return 0;
    }
    let sats = U256::from(tokens) * U256::from(QUOTE_SCALE) / quote;
    sats.saturating_to::<u64>()
}

/// Overflow-safe `amount · bp / 10000`, floor-rounded.
///
/// Splits the multiplication so the intermediate never exceeds 256 bits even
/// when `amount` is near `U256::MAX`.
#[must_use]
pub fn apply_basis_points(amount: U256, bp: u64) -> U256 {
    debug_assert!(bp <= crate::constants::BP_DENOMINATOR, "bp above 100%");
    let denom = U256::from(crate::constants::BP_DENOMINATOR);
    let bp = U256::from(bp);
    (amount / denom) * bp + (amount % denom) * bp / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_identity_within_one_unit() {
        // Round-down composition: tokens_to_satoshis(satoshis_to_tokens(x)) ≈ x.
        let quote = U256::from(250_000_000u64); // 2.5 tokens per sat
        for sats in [1u64, 599, 600, 10_000, 1_234_567, u32::MAX as u64] {
            let tokens = satoshis_to_tokens(sats, quote);
            let back = tokens_to_satoshis(tokens, quote);
            assert!(back <= sats && sats - back <= 1, "sats={sats} back={back}");
        }
    }

    #[test]
    fn zero_quote_values_nothing() {
        assert_eq!(tokens_to_satoshis(1_000_000, U256::ZERO), 0);
        assert_eq!(satoshis_to_tokens(1_000, U256::ZERO), 0);
    }

    #[test]
    fn conversions_round_down() {
        // quote = 0.5 token/sat: 3 sats → 1 token (1.5 floored).
        let quote = U256::from(50_000_000u64);
        assert_eq!(satoshis_to_tokens(3, quote), 1);
        // 1 token back → 2 sats (exactly).
        assert_eq!(tokens_to_satoshis(1, quote), 2);
    }

    #[test]
    fn apply_basis_points_floor() {
        assert_eq!(apply_basis_points(U256::from(10_000u64), 25), U256::from(25u64));
        assert_eq!(apply_basis_points(U256::from(9_999u64), 25), U256::from(24u64));
        assert_eq!(apply_basis_points(U256::ZERO, 9_000), U256::ZERO);
    }

    #[test]
    fn apply_basis_points_no_overflow_at_max() {
        // 90% of U256::MAX must not wrap.
        let out = apply_basis_points(U256::MAX, 9_000);
        assert!(out < U256::MAX);
        assert!(out > U256::MAX / U256::from(2u64));
    }

    #[test]
    fn saturation_instead_of_wrap() {
        // Astronomically high quote saturates the 128-bit token space.
        let quote = U256::MAX / U256::from(2u64);
        assert_eq!(satoshis_to_tokens(u64::MAX, quote), u128::MAX);
    }
}
