//! Error types for the Satpool engine.
//!
//! All errors use the `SP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Reservation errors
//! - 2xx: Liquidity / provider errors
//! - 3xx: Pool errors
//! - 4xx: Funds / transfer errors
//! - 9xx: Invariant violations ("impossible state" — corruption, never a
//!   business outcome; covered by assertions in tests, not recovery logic)

use thiserror::Error;

use crate::{ProviderId, QueueKind, ReservationId};

/// Central error enum for all Satpool operations.
///
/// Two classes: **business rejections** (expected user-facing outcomes) and
/// **invariant violations** (9xx — see [`SatpoolError::is_corruption`]).
/// Either class aborts the whole call; there is no local recovery.
#[derive(Debug, Error)]
pub enum SatpoolError {
    // =================================================================
    // Reservation Errors (1xx)
    // =================================================================
    /// No reservation exists for this (token, buyer) pair.
    #[error("SP_ERR_100: Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// The buyer already holds a live reservation for this token.
    #[error("SP_ERR_101: Duplicate reservation for buyer {buyer}")]
    DuplicateReservation { buyer: String },

    /// The reservation expired before settlement.
    #[error("SP_ERR_102: Reservation expired at block {expired_at}, current {current}")]
    ReservationExpired { expired_at: u64, current: u64 },

    /// Settlement attempted before the activation delay elapsed.
    #[error("SP_ERR_103: Reservation not active until block {ready_at}, current {current}")]
    ActivationDelayNotMet { ready_at: u64, current: u64 },

    /// A pool-flagged reservation was settled through `Swap` or vice versa.
    #[error("SP_ERR_104: Reservation kind mismatch (reserved_for_pool = {reserved_for_pool})")]
    ReservationKindMismatch { reserved_for_pool: bool },

    /// A request parameter failed validation.
    #[error("SP_ERR_110: Invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    // =================================================================
    // Liquidity / Provider Errors (2xx)
    // =================================================================
    /// Not enough liquidity across all queues to honor the request.
    #[error("SP_ERR_200: Insufficient liquidity: requested {requested}, reserved {reserved}")]
    InsufficientLiquidity { requested: u128, reserved: u128 },

    /// The reservation value is below the strict minimum.
    #[error("SP_ERR_201: Reservation below minimum: {sats} sat < {minimum} sat")]
    ReservationBelowMinimum { sats: u64, minimum: u64 },

    /// The provider has no active listing.
    #[error("SP_ERR_210: Provider not active: {0}")]
    ProviderNotActive(ProviderId),

    /// The provider is already listed in the other priority class.
    #[error("SP_ERR_211: Provider already listed (priority = {priority})")]
    ProviderAlreadyListed { priority: bool },

    /// The provider still has tokens locked by open reservations.
    #[error("SP_ERR_212: Provider has {reserved} tokens locked by open reservations")]
    ProviderHasReservedLiquidity { reserved: u128 },

    /// The caller is not a liquidity provider.
    #[error("SP_ERR_213: Not a liquidity provider: {0}")]
    NotLiquidityProvider(ProviderId),

    /// The provider already joined the removal queue.
    #[error("SP_ERR_214: Provider already pending removal: {0}")]
    AlreadyPendingRemoval(ProviderId),

    /// RemoveLiquidity with no BTC owed.
    #[error("SP_ERR_215: Provider is owed nothing")]
    NothingOwed,

    /// The bootstrap provider is exempt from ordinary queue operations.
    #[error("SP_ERR_216: Operation not permitted on the bootstrap provider")]
    BootstrapProviderImmutable,

    // =================================================================
    // Pool Errors (3xx)
    // =================================================================
    /// CreatePool on a token that already has a pool.
    #[error("SP_ERR_300: Pool already exists for token {0}")]
    PoolAlreadyExists(crate::TokenId),

    /// Operation on a token with no pool.
    #[error("SP_ERR_301: Pool not found for token {0}")]
    PoolNotFound(crate::TokenId),

    // =================================================================
    // Funds / Transfer Errors (4xx)
    // =================================================================
    /// Safe-transfer failed: the source balance is too small.
    #[error("SP_ERR_400: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    // =================================================================
    // Invariant Violations (9xx) — corruption, never business outcomes
    // =================================================================
    /// A provider's reserved amount exceeds its liquidity.
    #[error("SP_ERR_900: Corruption: reserved exceeds liquidity for {0}")]
    ReservedExceedsLiquidity(ProviderId),

    /// A persisted queue cursor outran the queue's actual content.
    #[error("SP_ERR_901: Corruption: {queue} starting index {starting} beyond length {len}")]
    StartingIndexBeyondLength {
        queue: QueueKind,
        starting: u64,
        len: u64,
    },

    /// A reservation's recorded purge index disagrees with its list slot.
    #[error("SP_ERR_902: Corruption: purge index {recorded} != list position {actual}")]
    PurgeIndexMismatch { recorded: u32, actual: u32 },

    /// A removal-queue provider's reserved BTC exceeds the BTC owed to it.
    #[error("SP_ERR_903: Corruption: owed-reserved exceeds owed for {0}")]
    OwedReservedExceedsOwed(ProviderId),

    /// The provider scan yielded the same slot twice in one reservation loop.
    #[error("SP_ERR_904: Corruption: repeated provider slot {slot} in one reservation")]
    RepeatedProviderInReservation { slot: u64 },

    /// No quote was recorded for the block a reservation was created in.
    #[error("SP_ERR_905: Corruption: no settlement quote recorded for block {block}")]
    MissingSettlementQuote { block: u64 },

    /// A provider of the wrong priority class appeared in a queue.
    #[error("SP_ERR_906: Corruption: provider {provider} does not belong in {queue} queue")]
    QueueClassMismatch {
        queue: QueueKind,
        provider: ProviderId,
    },

    /// Token reserve is positive while the BTC reserve is zero.
    #[error("SP_ERR_907: Corruption: virtual BTC reserve is zero with tokens outstanding")]
    EmptyVirtualBtcReserve,

    /// The per-address consumed watermark exceeds the transaction's outputs.
    #[error("SP_ERR_908: Corruption: consumed watermark exceeds outputs for {address}")]
    ConsumedExceedsOutputs { address: String },

    /// A reservation chunk points at a queue slot with no provider behind it.
    #[error("SP_ERR_909: Corruption: no provider behind {queue} queue slot {slot}")]
    MissingProviderAtSlot { queue: QueueKind, slot: u64 },

    /// A reservation in the purge range has not actually expired.
    #[error("SP_ERR_910: Corruption: unexpired reservation {0} in purge range")]
    UnexpiredReservationInPurgeRange(ReservationId),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SatpoolError>;

impl SatpoolError {
    /// Whether this error signals a state corruption (9xx) rather than an
    /// expected business rejection.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::ReservedExceedsLiquidity(_)
                | Self::StartingIndexBeyondLength { .. }
                | Self::PurgeIndexMismatch { .. }
                | Self::OwedReservedExceedsOwed(_)
                | Self::RepeatedProviderInReservation { .. }
                | Self::MissingSettlementQuote { .. }
                | Self::QueueClassMismatch { .. }
                | Self::EmptyVirtualBtcReserve
                | Self::ConsumedExceedsOutputs { .. }
                | Self::MissingProviderAtSlot { .. }
                | Self::UnexpiredReservationInPurgeRange(_)
        )
    }
}
