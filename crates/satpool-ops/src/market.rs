//! The market facade: owns the canonical state and makes every operation
//! all-or-nothing.
//!
//! Each call runs against a working copy of the store and vault; only a
//! successful operation replaces the canonical copies and publishes its
//! events. A failed call leaves no trace, which is the §5 revert semantic
//! without needing a transactional database.

use satpool_engine::LiquidityQueue;
use satpool_store::{CallContext, EventLog, MemoryStore, TokenVault};
use satpool_types::{
    CompletedTrade, PoolEvent, ReservationId, Result, TokenId,
};

use crate::ops::{self, MarketSettings};

/// Canonical state of one Satpool market plus its operation surface.
#[derive(Debug, Default)]
pub struct Market {
    settings: MarketSettings,
    store: MemoryStore,
    vault: TokenVault,
    events: EventLog,
}

impl Market {
    #[must_use]
    pub fn new(settings: MarketSettings) -> Self {
        Self {
            settings,
            store: MemoryStore::new(),
            vault: TokenVault::new(),
            events: EventLog::new(),
        }
    }

    /// Run one operation atomically: commit on success, discard on error.
    fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryStore, &mut TokenVault, &mut EventLog, &MarketSettings) -> Result<T>,
    ) -> Result<T> {
        let mut store = self.store.clone();
        let mut vault = self.vault.clone();
        let mut events = EventLog::new();
        match f(&mut store, &mut vault, &mut events, &self.settings) {
            Ok(out) => {
                self.store = store;
                self.vault = vault;
                for event in events.drain() {
                    self.events.emit(event);
                }
                Ok(out)
            }
            Err(err) => {
                tracing::debug!(%err, "operation rolled back");
                Err(err)
            }
        }
    }

    pub fn create_pool(
        &mut self,
        ctx: &CallContext,
        token: TokenId,
        floor_quote: u128,
        initial_liquidity: u128,
        receiver: &str,
        antibot_cap: u128,
        antibot_duration: u64,
    ) -> Result<()> {
        self.transact(|store, vault, events, settings| {
            ops::create_pool(
                store,
                vault,
                events,
                ctx,
                settings,
                token,
                floor_quote,
                initial_liquidity,
                receiver,
                antibot_cap,
                antibot_duration,
            )
        })
    }

    pub fn list_tokens(
        &mut self,
        ctx: &CallContext,
        token: TokenId,
        amount: u128,
        receiver: &str,
        priority: bool,
    ) -> Result<()> {
        self.transact(|store, vault, events, settings| {
            ops::list_tokens(
                store, vault, events, ctx, settings, token, amount, receiver, priority,
            )
        })
    }

    pub fn reserve_liquidity(
        &mut self,
        ctx: &CallContext,
        token: TokenId,
        max_sats_in: u64,
        min_tokens_out: u128,
        for_pool: bool,
        activation_delay: Option<u8>,
    ) -> Result<ReservationId> {
        self.transact(|store, vault, events, settings| {
            ops::reserve_liquidity(
                store,
                vault,
                events,
                ctx,
                settings,
                token,
                max_sats_in,
                min_tokens_out,
                for_pool,
                activation_delay,
            )
        })
    }

    pub fn swap(&mut self, ctx: &CallContext, token: TokenId) -> Result<CompletedTrade> {
        self.transact(|store, vault, events, settings| {
            ops::swap(store, vault, events, ctx, settings, token)
        })
    }

    pub fn add_liquidity(&mut self, ctx: &CallContext, token: TokenId) -> Result<CompletedTrade> {
        self.transact(|store, vault, events, settings| {
            ops::add_liquidity(store, vault, events, ctx, settings, token)
        })
    }

    pub fn remove_liquidity(&mut self, ctx: &CallContext, token: TokenId) -> Result<()> {
        self.transact(|store, vault, events, settings| {
            ops::remove_liquidity(store, vault, events, ctx, settings, token)
        })
    }

    pub fn cancel_listing(&mut self, ctx: &CallContext, token: TokenId) -> Result<()> {
        self.transact(|store, vault, events, settings| {
            ops::cancel_listing(store, vault, events, ctx, settings, token)
        })
    }

    // ------------------------------------------------------------------
    // Read-only surface and host plumbing
    // ------------------------------------------------------------------

    /// Current quote of a pool (tokens per sat, scaled).
    pub fn quote(&self, token: TokenId) -> Result<alloy_primitives::U256> {
        LiquidityQueue::load(&self.store, token, self.settings.fee, self.settings.queue).quote()
    }

    /// Whether a pool exists for this token.
    #[must_use]
    pub fn pool_exists(&self, token: TokenId) -> bool {
        LiquidityQueue::exists(&self.store, token)
    }

    /// Credit tokens to an address (host deposit hook; tests use it to fund
    /// providers).
    pub fn mint(&mut self, token: TokenId, to: &str, amount: u128) {
        self.vault.mint(token, to, amount);
    }

    /// Token balance of an address.
    #[must_use]
    pub fn balance_of(&self, token: TokenId, address: &str) -> u128 {
        self.vault.balance_of(token, address)
    }

    /// Events published by committed operations, in order.
    #[must_use]
    pub fn events(&self) -> &[PoolEvent] {
        self.events.events()
    }

    /// Drain published events (host hands them to its emitter).
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.events.drain()
    }
}
