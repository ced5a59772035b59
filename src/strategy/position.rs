use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ports::ExecutionGateway;
use crate::strategy::signal::Signal;
use crate::strategy::spread::SpreadRow;

pub const DEFAULT_LOT_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed direction of a fill: +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionDirection {
    /// Long A, short B.
    LongSpread,
    /// Short A, long B.
    ShortSpread,
}

impl PositionDirection {
    fn entry_sides(&self) -> (Side, Side) {
        match self {
            PositionDirection::LongSpread => (Side::Buy, Side::Sell),
            PositionDirection::ShortSpread => (Side::Sell, Side::Buy),
        }
    }
}

fn direction_label(direction: PositionDirection) -> &'static str {
    match direction {
        PositionDirection::LongSpread => "long_spread",
        PositionDirection::ShortSpread => "short_spread",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Open(PositionDirection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Opens a leg; carries take-profit/stop-loss.
    Entry,
    /// Unwinds a held leg; no bracket.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub kind: IntentKind,
}

impl TradeIntent {
    pub fn carries_risk(&self) -> bool {
        self.kind == IntentKind::Entry
    }
}

/// Intents emitted by one spread row.
#[derive(Debug, Clone)]
pub struct IntentBatch {
    pub ts: DateTime<Utc>,
    pub signal: Signal,
    pub intents: Vec<TradeIntent>,
}

/// `floor(lot_size * beta)`, sign preserved.
pub fn hedge_quantity(lot_size: i64, beta: f64) -> i64 {
    (lot_size as f64 * beta).floor() as i64
}

/// Pair position state machine. Allows at most one open pair position;
/// transitions commit as soon as intents are emitted, not on confirmed fills.
#[derive(Debug)]
pub struct PairPositionEngine {
    symbol_a: String,
    symbol_b: String,
    lot_size: i64,
    state: PositionState,
    opened_at: Option<DateTime<Utc>>,
    last_processed: Option<DateTime<Utc>>,
}

impl PairPositionEngine {
    pub fn new(symbol_a: &str, symbol_b: &str, lot_size: i64) -> Self {
        Self {
            symbol_a: symbol_a.to_string(),
            symbol_b: symbol_b.to_string(),
            lot_size,
            state: PositionState::Flat,
            opened_at: None,
            last_processed: None,
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PositionState::Open(_))
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Timestamp of the newest spread row already fed through the machine.
    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.last_processed
    }

    fn entry_intents(&self, direction: PositionDirection, beta: f64) -> Vec<TradeIntent> {
        let (side_a, side_b) = direction.entry_sides();
        let raw_b = hedge_quantity(self.lot_size, beta);
        // a negative hedge ratio hedges with the same-direction leg
        let (side_b, qty_b) = if raw_b < 0 {
            (side_b.opposite(), -raw_b)
        } else {
            (side_b, raw_b)
        };
        vec![
            TradeIntent {
                symbol: self.symbol_a.clone(),
                side: side_a,
                quantity: self.lot_size,
                kind: IntentKind::Entry,
            },
            TradeIntent {
                symbol: self.symbol_b.clone(),
                side: side_b,
                quantity: qty_b,
                kind: IntentKind::Entry,
            },
        ]
    }

    async fn exit_intents(&self, gateway: &dyn ExecutionGateway) -> Vec<TradeIntent> {
        let mut intents = Vec::new();
        for symbol in [&self.symbol_a, &self.symbol_b] {
            let held = match gateway.get_held_quantity(symbol).await {
                Ok(qty) => qty,
                Err(e) => {
                    log::warn!("[EXIT] {} held quantity unavailable, skipping leg: {}", symbol, e);
                    continue;
                }
            };
            if held == 0 {
                log::debug!("[EXIT] {} flat on the gateway; nothing to unwind", symbol);
                continue;
            }
            let side = if held > 0 { Side::Sell } else { Side::Buy };
            intents.push(TradeIntent {
                symbol: symbol.clone(),
                side,
                quantity: held.abs(),
                kind: IntentKind::Exit,
            });
        }
        intents
    }

    /// Applies one signal. Long/Short open only from Flat; Exit unwinds whatever
    /// the gateway reports as held. Every other combination is a no-op.
    pub async fn on_signal(
        &mut self,
        signal: Signal,
        beta: f64,
        gateway: &dyn ExecutionGateway,
    ) -> Vec<TradeIntent> {
        match (self.state, signal) {
            (PositionState::Flat, Signal::Long) | (PositionState::Flat, Signal::Short) => {
                let direction = if signal == Signal::Long {
                    PositionDirection::LongSpread
                } else {
                    PositionDirection::ShortSpread
                };
                let intents = self.entry_intents(direction, beta);
                log::info!(
                    "[ENTRY] {}/{} opening {} (beta={:.4} lot={})",
                    self.symbol_a,
                    self.symbol_b,
                    direction_label(direction),
                    beta,
                    self.lot_size
                );
                self.state = PositionState::Open(direction);
                self.opened_at = Some(Utc::now());
                intents
            }
            (PositionState::Open(direction), Signal::Exit) => {
                let intents = self.exit_intents(gateway).await;
                log::info!(
                    "[EXIT] {}/{} closing {} with {} unwind legs",
                    self.symbol_a,
                    self.symbol_b,
                    direction_label(direction),
                    intents.len()
                );
                self.state = PositionState::Flat;
                self.opened_at = None;
                intents
            }
            (PositionState::Open(_), Signal::Long) | (PositionState::Open(_), Signal::Short) => {
                log::debug!(
                    "[SIGNAL] {} ignored; {}/{} already open",
                    signal,
                    self.symbol_a,
                    self.symbol_b
                );
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Feeds one row through the machine unless it is not newer than the last
    /// processed timestamp.
    pub async fn step(
        &mut self,
        row: &SpreadRow,
        signal: Signal,
        beta: f64,
        gateway: &dyn ExecutionGateway,
    ) -> Option<IntentBatch> {
        if self.last_processed.map_or(false, |last| row.ts <= last) {
            return None;
        }
        let intents = self.on_signal(signal, beta, gateway).await;
        self.last_processed = Some(row.ts);
        if intents.is_empty() {
            return None;
        }
        Some(IntentBatch {
            ts: row.ts,
            signal,
            intents,
        })
    }

    /// Feeds rows newer than the last processed timestamp through the machine,
    /// strictly in chronological order.
    pub async fn consume(
        &mut self,
        rows: &[SpreadRow],
        signals: &[Signal],
        beta: f64,
        gateway: &dyn ExecutionGateway,
    ) -> Vec<IntentBatch> {
        let mut batches = Vec::new();
        for (row, signal) in rows.iter().zip(signals.iter()) {
            if let Some(batch) = self.step(row, *signal, beta, gateway).await {
                batches.push(batch);
            }
        }
        batches
    }
}
