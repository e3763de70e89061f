//! Structured engine events for the notification boundary.
//!
//! The engine emits events; delivery (chat, mail) belongs to the embedding
//! application. `TracingEventSink` logs them, `MemoryEventSink` keeps them.

use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::portfolio::{ClosedTrade, Position};

/// Open positions left over when a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Trial index, None for a historical replay.
    pub trial: Option<usize>,
    pub path_index: Option<usize>,
    pub open_positions: usize,
    pub committed: Decimal,
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A spread passed selection and sizing and was opened.
    CandidateTrade {
        trial: Option<usize>,
        step: i64,
        position: Position,
    },
    /// A position reached a terminal state.
    PositionClosed {
        trial: Option<usize>,
        trade: ClosedTrade,
    },
    Anomaly(Anomaly),
}

/// Receiver of engine events. Shared across trial threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::CandidateTrade {
                trial,
                step,
                position,
            } => debug!(
                ?trial,
                step,
                asset = %position.spread.asset,
                long = position.spread.long_strike,
                short = position.spread.short_strike,
                cost = position.spread.spread_cost,
                contracts = position.contracts,
                "Opened call debit spread"
            ),
            EngineEvent::PositionClosed { trial, trade } => debug!(
                ?trial,
                step = trade.exit_step,
                asset = %trade.asset,
                state = ?trade.state,
                pnl = trade.pnl,
                "Closed position"
            ),
            EngineEvent::Anomaly(anomaly) => warn!(
                trial = ?anomaly.trial,
                path = ?anomaly.path_index,
                open_positions = anomaly.open_positions,
                committed = %anomaly.committed,
                "Run ended with open positions"
            ),
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Drain the collected events.
    pub fn take(&self) -> Vec<EngineEvent> {
        match self.events.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: EngineEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: EngineEvent) {}
}
