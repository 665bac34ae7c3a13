//! System-wide constants for the Satpool engine.

/// Fixed-point scale of a quote: token units per satoshi, scaled by 10^8.
pub const QUOTE_SCALE: u128 = 100_000_000;

/// Basis-point denominator used by the fee and slashing curves.
pub const BP_DENOMINATOR: u64 = 10_000;

/// Blocks a reservation stays settleable before it expires.
pub const RESERVATION_EXPIRE_AFTER: u64 = 5;

/// Upper bound on a reservation's activation delay (blocks).
pub const MAX_ACTIVATION_DELAY: u8 = 3;

/// Default activation delay when the caller does not ask for one.
pub const DEFAULT_ACTIVATION_DELAY: u8 = 2;

/// Smallest settlement-currency value a reservation chunk may represent.
/// Anything below this is dust and is swept instead of reserved.
pub const STRICT_MINIMUM_RESERVATION_SATS: u64 = 600;

/// Size of the per-token quote history ring (indexed by `block % RING`).
pub const QUOTE_RING_SIZE: u64 = (u32::MAX as u64) - 1;

/// Lookback window for the volatility estimate, in blocks.
pub const VOLATILITY_WINDOW_BLOCKS: u64 = 5;

/// Blocks after listing during which cancellation costs the flat 50%.
pub const SLASH_GRACE_BLOCKS: u64 = 144;

/// Blocks over which the slashing penalty ramps from 50% to the cap.
pub const SLASH_RAMP_UP_BLOCKS: u64 = 1_008;

/// Flat penalty inside the grace window, in basis points.
pub const SLASH_BASE_BP: u64 = 5_000;

/// Extra penalty distributed across the ramp window, in basis points.
pub const SLASH_RAMP_BP: u64 = 4_000;

/// Hard cap on the slashing penalty, in basis points.
pub const SLASH_CAP_BP: u64 = 9_000;

/// Default base fee of the dynamic fee curve, in basis points.
pub const DEFAULT_BASE_FEE_BP: u64 = 20;

/// Default lower clamp of the dynamic fee, in basis points.
pub const DEFAULT_MIN_FEE_BP: u64 = 15;

/// Default upper clamp of the dynamic fee, in basis points.
pub const DEFAULT_MAX_FEE_BP: u64 = 150;

/// Default trade-size coefficient of the fee curve.
pub const DEFAULT_FEE_ALPHA: u64 = 20;

/// Default volatility coefficient of the fee curve.
pub const DEFAULT_FEE_BETA: u64 = 15;

/// Default utilization coefficient of the fee curve.
pub const DEFAULT_FEE_GAMMA: u64 = 3;

/// Default reference trade size for the alpha component (token base units).
pub const DEFAULT_REF_TRADE_SIZE: u128 = 10_000_000;

/// Unspendable sink address used when burning slashed or dust funds.
pub const DEAD_ADDRESS: &str = "bc1qdead000000000000000000000000000000dead";

/// Sentinel queue slot reported for the bootstrap provider, which never
/// occupies a real slot. Two consecutive sentinel returns end a scan.
pub const BOOTSTRAP_SLOT: u64 = u64::MAX;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Satpool";
