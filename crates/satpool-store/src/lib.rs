//! # satpool-store
//!
//! **Collaborator seams** between the Satpool engine and its host
//! environment, plus in-memory implementations used by tests and the ops
//! crate.
//!
//! The engine never talks to a database, a chain, or a wallet directly; it
//! sees exactly the contracts in this crate:
//!
//! - [`KeyValueStore`]: persistent slots keyed by [`StorageKey`], zero
//!   default on miss
//! - [`SlotQueue`]: append-only id sequence with tombstone deletion and a
//!   persisted starting index
//! - [`CallContext`]: the current block height, transaction sender, and
//!   transaction outputs
//! - [`TokenVault`]: safe token transfers (whole-call failure on
//!   insufficient balance)
//! - [`EventLog`]: ordered structured event sink
//!
//! Packing helpers keep every persisted record a fixed-width 256-bit slot so
//! all validators decode identical state.

pub mod context;
pub mod key;
pub mod kv;
pub mod memory;
pub mod packing;
pub mod queue;
pub mod vault;

pub use context::{CallContext, EventLog, TxOutput};
pub use key::{Pointer, StorageKey};
pub use kv::KeyValueStore;
pub use memory::MemoryStore;
pub use queue::SlotQueue;
pub use vault::TokenVault;
