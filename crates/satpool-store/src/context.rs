//! Per-call environment: block height, sender, transaction outputs, and the
//! structured event sink.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use satpool_types::PoolEvent;

/// One output of the current Bitcoin transaction, as the host enumerates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Receiving address.
    pub to: String,
    /// Amount in satoshis.
    pub sats: u64,
}

/// Immutable context of the executing call.
///
/// The engine reads the chain exclusively through this struct; nothing else
/// about the host leaks in, which is what keeps calls replayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Current block height.
    pub block_number: u64,
    /// Address of the transaction sender (the buyer for reservations).
    pub sender: String,
    /// Outputs of the current transaction.
    pub outputs: Vec<TxOutput>,
}

impl CallContext {
    /// Context with no payment outputs (listing, cancel, reserve calls).
    #[must_use]
    pub fn new(block_number: u64, sender: impl Into<String>) -> Self {
        Self {
            block_number,
            sender: sender.into(),
            outputs: Vec::new(),
        }
    }

    /// Attach payment outputs (settlement calls).
    #[must_use]
    pub fn with_outputs(mut self, outputs: Vec<TxOutput>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Total satoshis this transaction sends to `address`, across all of its
    /// outputs. Settlement subtracts its own running watermark from this.
    #[must_use]
    pub fn total_sent_to(&self, address: &str) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.to == address)
            .map(|o| o.sats)
            .sum()
    }

    /// Totals per receiving address, computed once per settlement call.
    #[must_use]
    pub fn output_totals(&self) -> HashMap<String, u64> {
        let mut totals: HashMap<String, u64> = HashMap::new();
        for output in &self.outputs {
            *totals.entry(output.to.clone()).or_insert(0) += output.sats;
        }
        totals
    }
}

/// Ordered sink for the structured events of one call.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PoolEvent>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event.
    pub fn emit(&mut self, event: PoolEvent) {
        tracing::debug!(event = event.name(), "event emitted");
        self.events.push(event);
    }

    /// Events emitted so far, in order.
    #[must_use]
    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    /// Drain all events (host hands them to its log emitter).
    pub fn drain(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satpool_types::TokenId;

    #[test]
    fn output_totals_aggregate_per_address() {
        let ctx = CallContext::new(840_000, "bc1qbuyer").with_outputs(vec![
            TxOutput {
                to: "bc1qa".into(),
                sats: 1_000,
            },
            TxOutput {
                to: "bc1qb".into(),
                sats: 500,
            },
            TxOutput {
                to: "bc1qa".into(),
                sats: 250,
            },
        ]);
        assert_eq!(ctx.total_sent_to("bc1qa"), 1_250);
        assert_eq!(ctx.total_sent_to("bc1qb"), 500);
        assert_eq!(ctx.total_sent_to("bc1qnone"), 0);
        assert_eq!(ctx.output_totals().get("bc1qa"), Some(&1_250));
    }

    #[test]
    fn event_log_preserves_order() {
        let mut log = EventLog::new();
        let token = TokenId::from_name("ORDI");
        log.emit(PoolEvent::PoolCreated {
            token,
            initial_liquidity: 1,
            floor_quote: 1,
        });
        log.emit(PoolEvent::LiquidityListed {
            token,
            provider: satpool_types::ProviderId::from_address("bc1qp"),
            amount: 10,
            priority: false,
        });
        let names: Vec<_> = log.events().iter().map(PoolEvent::name).collect();
        assert_eq!(names, ["PoolCreated", "LiquidityListed"]);
        assert_eq!(log.drain().len(), 2);
        assert!(log.events().is_empty());
    }
}
