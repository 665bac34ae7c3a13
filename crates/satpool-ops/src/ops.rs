//! The seven user-facing operations, each one atomic state transition.
//!
//! Every mutating operation follows the same shape: load the pool, run the
//! purge pass, fold pending intents into the virtual reserves, apply the
//! operation's own semantics, then flush with a single `save` and emit the
//! operation's events. Callers provide a working copy of the store and
//! vault and commit it only on `Ok` (see [`crate::Market`]).

use alloy_primitives::U256;
use satpool_engine::{DynamicFee, LiquidityQueue, Reservation, slash_penalty};
use satpool_engine::reservation::Chunk;
use satpool_store::vault::POOL_ADDRESS;
use satpool_store::{CallContext, EventLog, KeyValueStore, TokenVault};
use satpool_types::{
    CompletedTrade, FeeSettings, PoolEvent, ProviderId, QueueKind, QueueSettings,
    ReservationId, Result, SatpoolError, TokenId, constants, satoshis_to_tokens,
    tokens_to_satoshis,
};

/// Settings shared by every operation on one market.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketSettings {
    pub fee: FeeSettings,
    pub queue: QueueSettings,
}

/// Shared prologue of every mutating operation on an existing pool.
fn load_pool<S: KeyValueStore>(
    store: &mut S,
    events: &mut EventLog,
    ctx: &CallContext,
    token: TokenId,
    settings: &MarketSettings,
) -> Result<LiquidityQueue> {
    if !LiquidityQueue::exists(store, token) {
        return Err(SatpoolError::PoolNotFound(token));
    }
    let mut queue = LiquidityQueue::load(store, token, settings.fee, settings.queue);
    queue.purge_expired_reservations(store, events, ctx.block_number)?;
    queue.update_virtual_pool_if_needed(store, ctx.block_number)?;
    Ok(queue)
}

// ---------------------------------------------------------------------------
// CreatePool
// ---------------------------------------------------------------------------

/// Bootstrap a pool for a token.
///
/// Seeds the virtual reserves at `floor_quote` (tokens per sat, scaled by
/// `QUOTE_SCALE`), takes custody of the initial liquidity, and registers the
/// sender's receiver address as the bootstrap provider, which never occupies
/// a queue slot.
#[allow(clippy::too_many_arguments)]
pub fn create_pool<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
    floor_quote: u128,
    initial_liquidity: u128,
    receiver: &str,
    antibot_cap: u128,
    antibot_duration: u64,
) -> Result<()> {
    if LiquidityQueue::exists(store, token) {
        return Err(SatpoolError::PoolAlreadyExists(token));
    }
    if initial_liquidity == 0 || floor_quote == 0 {
        return Err(SatpoolError::InvalidParameters {
            reason: "initial liquidity and floor quote must be positive".into(),
        });
    }
    let virtual_btc = tokens_to_satoshis(initial_liquidity, U256::from(floor_quote));
    if virtual_btc == 0 {
        return Err(SatpoolError::InvalidParameters {
            reason: "floor quote values the initial liquidity below one satoshi".into(),
        });
    }

    vault.transfer(token, &ctx.sender, POOL_ADDRESS, initial_liquidity)?;

    let mut queue = LiquidityQueue::load(store, token, settings.fee, settings.queue);
    queue.virtual_token_reserve = U256::from(initial_liquidity);
    queue.virtual_btc_reserve = U256::from(virtual_btc);
    queue.total_reserves = U256::from(initial_liquidity);
    queue.antibot_cap = antibot_cap;
    queue.antibot_expiry = ctx.block_number + antibot_duration;
    queue.last_purged_block = ctx.block_number;

    let bootstrap = ProviderId::from_address(receiver);
    queue.manager.set_initial_provider(bootstrap);
    {
        let p = queue.arena.get_mut(store, bootstrap);
        p.liquidity = initial_liquidity;
        p.active = true;
        p.can_provide_liquidity = true;
        p.btc_receiver = receiver.to_string();
        p.listed_at = ctx.block_number;
    }

    // Records the opening quote in the ring for this block.
    queue.update_virtual_pool_if_needed(store, ctx.block_number)?;
    queue.save(store);
    events.emit(PoolEvent::PoolCreated {
        token,
        initial_liquidity,
        floor_quote,
    });
    tracing::info!(%token, initial_liquidity, floor_quote, "pool created");
    Ok(())
}

// ---------------------------------------------------------------------------
// ListTokensForSale
// ---------------------------------------------------------------------------

/// List tokens in the standard or priority queue.
#[allow(clippy::too_many_arguments)]
pub fn list_tokens<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
    amount: u128,
    receiver: &str,
    priority: bool,
) -> Result<()> {
    let mut queue = load_pool(store, events, ctx, token, settings)?;
    if amount == 0 {
        return Err(SatpoolError::InvalidParameters {
            reason: "cannot list zero tokens".into(),
        });
    }
    let quote = queue.quote()?;
    let value_sats = tokens_to_satoshis(amount, quote);
    if value_sats < settings.queue.strict_minimum_sats {
        return Err(SatpoolError::InvalidParameters {
            reason: format!(
                "listing worth {value_sats} sat is below the {} sat minimum",
                settings.queue.strict_minimum_sats
            ),
        });
    }

    let id = ProviderId::from_address(&ctx.sender);
    let (was_active, listed_priority, pending_removal, pool_enabled) = {
        let p = queue.arena.get_mut(store, id);
        (p.active, p.priority, p.pending_removal, p.can_provide_liquidity)
    };
    if pending_removal {
        return Err(SatpoolError::AlreadyPendingRemoval(id));
    }
    if was_active && listed_priority != priority {
        return Err(SatpoolError::ProviderAlreadyListed {
            priority: listed_priority,
        });
    }

    vault.transfer(token, &ctx.sender, POOL_ADDRESS, amount)?;

    {
        let p = queue.arena.get_mut(store, id);
        p.liquidity = p.liquidity.saturating_add(amount);
        p.btc_receiver = receiver.to_string();
        p.listed_at = ctx.block_number;
        if !was_active {
            p.active = true;
            p.priority = priority;
        }
    }
    if !was_active {
        let kind = if priority {
            QueueKind::Priority
        } else {
            QueueKind::Standard
        };
        queue.manager.enqueue(store, id, kind);
    }
    // A pool-enabled provider's listing counts toward the virtual reserve
    // right away; a fresh listing is credited at its first settlement.
    if pool_enabled {
        queue.delta_tokens_add = queue
            .delta_tokens_add
            .saturating_add(i128::try_from(amount).unwrap_or(i128::MAX));
    }
    queue.total_reserves = queue.total_reserves.saturating_add(U256::from(amount));

    queue.save(store);
    events.emit(PoolEvent::LiquidityListed {
        token,
        provider: id,
        amount,
        priority,
    });
    tracing::info!(%token, provider = %id, amount, priority, "liquidity listed");
    Ok(())
}

// ---------------------------------------------------------------------------
// ReserveLiquidity
// ---------------------------------------------------------------------------

/// Reserve liquidity against an expected BTC payment.
///
/// Builds chunks by walking the provider queues until the satoshi budget is
/// covered or the queues are exhausted; fails if the collected total falls
/// short of `min_tokens_out`.
#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
pub fn reserve_liquidity<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
    max_sats_in: u64,
    min_tokens_out: u128,
    for_pool: bool,
    activation_delay: Option<u8>,
) -> Result<ReservationId> {
    let mut queue = load_pool(store, events, ctx, token, settings)?;
    if max_sats_in < settings.queue.strict_minimum_sats {
        return Err(SatpoolError::ReservationBelowMinimum {
            sats: max_sats_in,
            minimum: settings.queue.strict_minimum_sats,
        });
    }

    let id = ReservationId::deterministic(token, &ctx.sender);
    if let Some(existing) = Reservation::load(store, token, id) {
        if !existing.is_expired(ctx.block_number) {
            return Err(SatpoolError::DuplicateReservation {
                buyer: ctx.sender.clone(),
            });
        }
        // Expired but not yet purged: restore its allocations and replace it.
        queue.restore_reservation(store, &existing)?;
    }

    let delay = if queue.buyer_timed_out(store, id) {
        // Buyers that let a reservation rot wait the full delay once.
        queue.clear_buyer_timeout(store, id);
        settings.queue.max_activation_delay
    } else {
        activation_delay
            .unwrap_or(constants::DEFAULT_ACTIVATION_DELAY)
            .min(settings.queue.max_activation_delay)
    };

    let quote = queue.quote()?;
    let mut target = satoshis_to_tokens(max_sats_in, quote);
    if ctx.block_number < queue.antibot_expiry && queue.antibot_cap > 0 {
        target = target.min(queue.antibot_cap);
    }
    if target == 0 {
        return Err(SatpoolError::InsufficientLiquidity {
            requested: min_tokens_out,
            reserved: 0,
        });
    }

    let mut remaining = target;
    let mut chunks: Vec<Chunk> = Vec::new();
    while remaining > 0 {
        let Some(candidate) =
            queue
                .manager
                .next_provider_with_liquidity(store, &mut queue.arena, vault, quote)?
        else {
            break;
        };
        let amount = if candidate.queue == QueueKind::Removal {
            let owed = queue.manager.btc_owed(store, candidate.id);
            let owed_reserved = queue.manager.btc_owed_reserved(store, candidate.id);
            let available_sats = owed.saturating_sub(owed_reserved);
            // The tokens behind a removal chunk come out of the bootstrap
            // provider's inventory; the chunk is capped by what it can back.
            let boot = queue.manager.initial_provider();
            let backing = if boot.is_empty() {
                0
            } else {
                queue.arena.get_mut(store, boot).available()
            };
            let chunk_sats = available_sats.min(tokens_to_satoshis(remaining, quote));
            let chunk_tokens = satoshis_to_tokens(chunk_sats, quote)
                .min(remaining)
                .min(backing);
            if chunk_tokens == 0 {
                continue;
            }
            let chunk_sats = tokens_to_satoshis(chunk_tokens, quote).min(chunk_sats);
            queue
                .manager
                .set_btc_owed_reserved(store, candidate.id, owed_reserved + chunk_sats);
            let p = queue.arena.get_mut(store, boot);
            p.reserved = p.reserved.saturating_add(chunk_tokens);
            chunk_tokens
        } else {
            let available = queue.arena.get_mut(store, candidate.id).available();
            let chunk_tokens = available.min(remaining);
            if chunk_tokens == 0 {
                continue;
            }
            let p = queue.arena.get_mut(store, candidate.id);
            p.reserved = p.reserved.saturating_add(chunk_tokens);
            chunk_tokens
        };
        queue.total_reserved = queue.total_reserved.saturating_add(U256::from(amount));
        chunks.push(Chunk {
            queue: candidate.queue,
            slot: candidate.slot,
            amount,
        });
        remaining -= amount;
        tracing::debug!(
            provider = %candidate.id,
            slot = candidate.slot,
            queue = %candidate.queue,
            amount,
            "chunk reserved"
        );
    }
    queue.total_reserves = queue
        .total_reserves
        .saturating_sub(U256::from(queue.manager.take_swept_dust()));

    let total: u128 = target - remaining;
    if total < min_tokens_out || total == 0 {
        return Err(SatpoolError::InsufficientLiquidity {
            requested: min_tokens_out.max(1),
            reserved: total,
        });
    }
    let expected_sats = tokens_to_satoshis(total, quote);
    if expected_sats < settings.queue.strict_minimum_sats {
        return Err(SatpoolError::ReservationBelowMinimum {
            sats: expected_sats,
            minimum: settings.queue.strict_minimum_sats,
        });
    }

    let mut reservation = Reservation {
        id,
        token,
        created_at: ctx.block_number,
        expiration: ctx.block_number + settings.queue.reservation_expire_after,
        activation_delay: delay,
        reserved_for_pool: for_pool,
        timeout: false,
        purge_index: 0,
        chunks,
    };
    reservation.register_active(store);
    reservation.save(store);

    queue.save(store);
    events.emit(PoolEvent::LiquidityReserved {
        token,
        reservation: id,
        tokens_reserved: total,
        expected_sats,
    });
    events.emit(PoolEvent::ReservationCreated {
        token,
        reservation: id,
        expiration_block: reservation.expiration,
        activation_delay: delay,
    });
    tracing::info!(
        %token,
        reservation = %id,
        tokens = total,
        expected_sats,
        chunks = reservation.chunks.len(),
        "liquidity reserved"
    );
    Ok(id)
}

// ---------------------------------------------------------------------------
// Swap
// ---------------------------------------------------------------------------

/// Settle a buy reservation against the transaction's BTC outputs.
pub fn swap<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
) -> Result<CompletedTrade> {
    let mut queue = load_pool(store, events, ctx, token, settings)?;
    let id = ReservationId::deterministic(token, &ctx.sender);
    let reservation =
        Reservation::load(store, token, id).ok_or(SatpoolError::ReservationNotFound(id))?;
    if reservation.reserved_for_pool {
        return Err(SatpoolError::ReservationKindMismatch {
            reserved_for_pool: true,
        });
    }
    if ctx.block_number < reservation.ready_at() {
        return Err(SatpoolError::ActivationDelayNotMet {
            ready_at: reservation.ready_at(),
            current: ctx.block_number,
        });
    }

    let trade = queue.execute_trade(store, vault, ctx, &reservation)?;

    let fee_bp = queue.fee.fee_bp(
        trade.total_satoshis_spent,
        queue.volatility,
        queue.utilization_pct(),
    );
    let fee_tokens =
        DynamicFee::compute_fee_amount(U256::from(trade.total_tokens_purchased), fee_bp)
            .saturating_to::<u128>();
    let tokens_out = trade.total_tokens_purchased.saturating_sub(fee_tokens);
    // The fee never leaves custody: it stays in the pool's reserves.
    queue.total_reserves = queue.total_reserves.saturating_add(U256::from(fee_tokens));
    if tokens_out > 0 {
        vault.transfer(token, POOL_ADDRESS, &ctx.sender, tokens_out)?;
    }

    queue.save(store);
    events.emit(PoolEvent::SwapExecuted {
        token,
        buyer: ProviderId::from_address(&ctx.sender),
        tokens_out,
        sats_in: trade.total_satoshis_spent,
        fee_tokens,
    });
    tracing::info!(
        %token,
        buyer = %ctx.sender,
        tokens_out,
        sats_in = trade.total_satoshis_spent,
        fee_bp,
        "swap executed"
    );
    Ok(trade)
}

// ---------------------------------------------------------------------------
// AddLiquidity
// ---------------------------------------------------------------------------

/// Settle an LP-flagged reservation: the purchased tokens become the buyer's
/// own listed liquidity and the satoshis spent accrue as BTC the pool owes
/// them.
pub fn add_liquidity<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
) -> Result<CompletedTrade> {
    let mut queue = load_pool(store, events, ctx, token, settings)?;
    let id = ReservationId::deterministic(token, &ctx.sender);
    let reservation =
        Reservation::load(store, token, id).ok_or(SatpoolError::ReservationNotFound(id))?;
    if !reservation.reserved_for_pool {
        return Err(SatpoolError::ReservationKindMismatch {
            reserved_for_pool: false,
        });
    }
    if ctx.block_number < reservation.ready_at() {
        return Err(SatpoolError::ActivationDelayNotMet {
            ready_at: reservation.ready_at(),
            current: ctx.block_number,
        });
    }

    let trade = queue.execute_trade(store, vault, ctx, &reservation)?;
    let provider = ProviderId::from_address(&ctx.sender);

    if trade.total_tokens_purchased > 0 {
        let was_active = {
            let p = queue.arena.get_mut(store, provider);
            let was_active = p.active;
            p.liquidity = p.liquidity.saturating_add(trade.total_tokens_purchased);
            p.liquidity_provided = p
                .liquidity_provided
                .saturating_add(U256::from(trade.total_tokens_purchased));
            p.is_lp = true;
            p.can_provide_liquidity = true;
            p.btc_receiver = ctx.sender.clone();
            p.listed_at = ctx.block_number;
            if !was_active {
                p.active = true;
                p.priority = false;
            }
            was_active
        };
        if !was_active {
            queue.manager.enqueue(store, provider, QueueKind::Standard);
        }
        // The purchased tokens never leave the pool: they are re-listed.
        queue.total_reserves = queue
            .total_reserves
            .saturating_add(U256::from(trade.total_tokens_purchased));
        queue.delta_tokens_add = queue
            .delta_tokens_add
            .saturating_add(i128::try_from(trade.total_tokens_purchased).unwrap_or(i128::MAX));
        let owed = queue.manager.btc_owed(store, provider);
        queue.manager.set_btc_owed(
            store,
            provider,
            owed.saturating_add(trade.total_satoshis_spent),
        );
    }

    queue.save(store);
    events.emit(PoolEvent::LiquidityAdded {
        token,
        provider,
        tokens: trade.total_tokens_purchased,
        sats_contributed: trade.total_satoshis_spent,
    });
    tracing::info!(
        %token,
        provider = %ctx.sender,
        tokens = trade.total_tokens_purchased,
        sats = trade.total_satoshis_spent,
        "liquidity added"
    );
    Ok(trade)
}

// ---------------------------------------------------------------------------
// RemoveLiquidity
// ---------------------------------------------------------------------------

/// Start withdrawing a liquidity-provider position.
///
/// Unreserved listed tokens return to the provider immediately; the BTC the
/// pool owes them is paid down by future removal-queue settlements.
pub fn remove_liquidity<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
) -> Result<()> {
    let mut queue = load_pool(store, events, ctx, token, settings)?;
    let id = ProviderId::from_address(&ctx.sender);
    if id == queue.manager.initial_provider() {
        return Err(SatpoolError::BootstrapProviderImmutable);
    }
    let (is_lp, pending_removal, available, reserved, priority) = {
        let p = queue.arena.get_mut(store, id);
        (p.is_lp, p.pending_removal, p.available(), p.reserved, p.priority)
    };
    if !is_lp {
        return Err(SatpoolError::NotLiquidityProvider(id));
    }
    if pending_removal {
        return Err(SatpoolError::AlreadyPendingRemoval(id));
    }
    let owed = queue.manager.btc_owed(store, id);
    if owed == 0 {
        return Err(SatpoolError::NothingOwed);
    }

    if available > 0 {
        vault.transfer(token, POOL_ADDRESS, &ctx.sender, available)?;
        queue.total_reserves = queue.total_reserves.saturating_sub(U256::from(available));
        queue.delta_tokens_add = queue
            .delta_tokens_add
            .saturating_sub(i128::try_from(available).unwrap_or(i128::MAX));
        let p = queue.arena.get_mut(store, id);
        p.liquidity = p.liquidity.saturating_sub(available);
    }

    {
        let p = queue.arena.get_mut(store, id);
        p.pending_removal = true;
        if p.liquidity == 0 {
            p.active = false;
        }
    }
    // Leave the listing queue once nothing is listed there anymore.
    if reserved == 0 {
        let kind = if priority {
            QueueKind::Priority
        } else {
            QueueKind::Standard
        };
        if let Some(slot) = queue.manager.find_slot(store, kind, id) {
            queue.manager.tombstone(store, kind, slot);
        }
    }
    queue.manager.enqueue(store, id, QueueKind::Removal);

    queue.save(store);
    events.emit(PoolEvent::LiquidityRemoved {
        token,
        provider: id,
        sats_owed: owed,
        tokens_returned: available,
    });
    tracing::info!(%token, provider = %id, owed, returned = available, "liquidity removal started");
    Ok(())
}

// ---------------------------------------------------------------------------
// CancelListing
// ---------------------------------------------------------------------------

/// Cancel an active listing, forfeiting the slashing penalty.
pub fn cancel_listing<S: KeyValueStore>(
    store: &mut S,
    vault: &mut TokenVault,
    events: &mut EventLog,
    ctx: &CallContext,
    settings: &MarketSettings,
    token: TokenId,
) -> Result<()> {
    let mut queue = load_pool(store, events, ctx, token, settings)?;
    let id = ProviderId::from_address(&ctx.sender);
    if id == queue.manager.initial_provider() {
        return Err(SatpoolError::BootstrapProviderImmutable);
    }
    let (active, reserved, is_lp, liquidity, listed_at, pool_enabled) = {
        let p = queue.arena.get_mut(store, id);
        (
            p.active,
            p.reserved,
            p.is_lp,
            p.liquidity,
            p.listed_at,
            p.can_provide_liquidity,
        )
    };
    if !active {
        return Err(SatpoolError::ProviderNotActive(id));
    }
    if reserved > 0 {
        return Err(SatpoolError::ProviderHasReservedLiquidity { reserved });
    }
    if is_lp {
        return Err(SatpoolError::InvalidParameters {
            reason: "liquidity-provider positions are withdrawn, not canceled".into(),
        });
    }

    let elapsed = ctx.block_number.saturating_sub(listed_at);
    let penalty =
        slash_penalty(U256::from(liquidity), elapsed, &settings.queue).saturating_to::<u128>();
    let refund = liquidity.saturating_sub(penalty);

    if refund > 0 {
        vault.transfer(token, POOL_ADDRESS, &ctx.sender, refund)?;
    }
    if penalty > 0 {
        vault.transfer(token, POOL_ADDRESS, constants::DEAD_ADDRESS, penalty)?;
    }
    queue.total_reserves = queue.total_reserves.saturating_sub(U256::from(liquidity));
    if pool_enabled {
        queue.delta_tokens_add = queue
            .delta_tokens_add
            .saturating_sub(i128::try_from(liquidity).unwrap_or(i128::MAX));
    }
    // Burn already happened above, so the remainder must not burn again.
    {
        let p = queue.arena.get_mut(store, id);
        p.liquidity = 0;
    }
    queue
        .manager
        .reset_provider(store, &mut queue.arena, vault, id, false)?;

    queue.save(store);
    events.emit(PoolEvent::ListingCanceled {
        token,
        provider: id,
        refunded: refund,
        penalty,
    });
    tracing::info!(%token, provider = %id, refund, penalty, "listing canceled");
    Ok(())
}
