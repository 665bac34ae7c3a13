//! Token custody and safe transfers.
//!
//! The vault is the host's token-transfer collaborator: a transfer either
//! moves the full amount or fails the whole call. The engine never observes
//! partial transfers.

use std::collections::HashMap;

use satpool_types::{Result, SatpoolError, TokenId};

/// Address of the pool's own escrow account.
pub const POOL_ADDRESS: &str = "satpool:escrow";

/// In-memory token ledger with safe-transfer semantics.
#[derive(Debug, Clone, Default)]
pub struct TokenVault {
    balances: HashMap<(TokenId, String), u128>,
}

impl TokenVault {
    /// Create an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit tokens out of thin air (genesis / test funding).
    pub fn mint(&mut self, token: TokenId, to: &str, amount: u128) {
        *self.balances.entry((token, to.to_string())).or_insert(0) += amount;
    }

    /// Balance of an address.
    #[must_use]
    pub fn balance_of(&self, token: TokenId, address: &str) -> u128 {
        self.balances
            .get(&(token, address.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Safe transfer: moves the full amount or fails the call.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if `from` holds less than `amount`.
    pub fn transfer(&mut self, token: TokenId, from: &str, to: &str, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(SatpoolError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        *self
            .balances
            .get_mut(&(token, from.to_string()))
            .expect("balance checked above") -= amount;
        *self.balances.entry((token, to.to_string())).or_insert(0) += amount;
        tracing::debug!(%token, from, to, amount, "token transfer");
        Ok(())
    }
}
