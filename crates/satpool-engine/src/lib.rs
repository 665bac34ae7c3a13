//! # satpool-engine
//!
//! **The deterministic core of Satpool**: provider queues, the virtual
//! constant-product reserve model, reservations, settlement, and the fee and
//! slashing curves.
//!
//! Everything here is pure state-machine logic over the collaborator seams
//! in `satpool-store`:
//!
//! - **Zero wall-clock time**: block height is the only clock
//! - **Zero randomness**: every id and every transition is derived
//! - **No partial failure**: any error unwinds the whole call
//!
//! The ops crate composes these pieces into the seven user-facing
//! operations.

pub mod fee;
pub mod manager;
pub mod provider;
pub mod queue;
pub mod reservation;
pub mod slashing;

pub use fee::DynamicFee;
pub use manager::{Candidate, ProviderManager};
pub use provider::{Provider, ProviderArena};
pub use queue::LiquidityQueue;
pub use reservation::{Chunk, Reservation};
pub use slashing::slash_penalty;
