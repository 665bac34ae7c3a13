//! # satpool-types
//!
//! Shared types, errors, and configuration for the **Satpool** liquidity
//! market engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TokenId`], [`ProviderId`], [`ReservationId`], [`QueueKind`]
//! - **Trade result**: [`CompletedTrade`]
//! - **Events**: [`PoolEvent`]
//! - **Configuration**: [`FeeSettings`], [`QueueSettings`]
//! - **Integer conversion math**: [`satoshis_to_tokens`], [`tokens_to_satoshis`]
//! - **Errors**: [`SatpoolError`] with `SP_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod num;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use satpool_types::{TokenId, ProviderId, SatpoolError, ...};

pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use num::*;
pub use trade::*;

// Constants are accessed via `satpool_types::constants::FOO`
// (not re-exported to avoid name collisions).
