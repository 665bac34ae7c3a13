//! # satpool-ops
//!
//! **The user-facing surface of the Satpool liquidity market**: the seven
//! operations (create pool, list, reserve, swap, add liquidity, remove
//! liquidity, cancel listing), each executed as one atomic state
//! transition.
//!
//! [`Market`] owns the canonical store, vault, and event log; every
//! operation runs against a working copy and commits only on success.
//! The operation bodies live in [`ops`] as free functions over the
//! `satpool-store` seams so hosts with their own persistence can call them
//! directly.

pub mod market;
pub mod ops;

pub use market::Market;
pub use ops::MarketSettings;
