//! Collaborator interfaces the engine talks to: market data, order execution
//! and trade logging. Implementations live in the submodules.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PairTradeError;
use crate::strategy::aligner::PriceSeries;
use crate::strategy::position::Side;
use crate::strategy::risk::OrderRequest;

pub mod paper_broker;
pub mod replay_feed;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily closing prices for `symbol` between `start` and `end`, inclusive.
    async fn get_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PairTradeError>;

    async fn get_latest_price(&self, symbol: &str) -> Result<f64, PairTradeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHandle {
    pub order_id: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenOrderKind {
    Limit,
    TakeProfit,
    StopLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub kind: OpenOrderKind,
    pub price: Decimal,
    /// The other half of a one-cancels-other pair.
    pub linked_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldPosition {
    pub symbol: String,
    /// Signed: negative quantities are short.
    pub quantity: i64,
    pub avg_entry_price: Decimal,
}

#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderHandle, PairTradeError>;

    /// Signed quantity currently held; 0 when flat.
    async fn get_held_quantity(&self, symbol: &str) -> Result<i64, PairTradeError>;

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, PairTradeError>;

    async fn list_positions(&self) -> Result<Vec<HeldPosition>, PairTradeError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), PairTradeError>;

    /// Returns the number of orders cancelled.
    async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<usize, PairTradeError>;

    /// Flattens `symbol` at market. `None` when nothing was held.
    async fn close_position(&self, symbol: &str) -> Result<Option<OrderHandle>, PairTradeError>;

    /// Returns the number of positions closed.
    async fn close_all_positions(&self) -> Result<usize, PairTradeError>;
}

/// One line of the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Milliseconds since the epoch.
    pub ts: i64,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub entry: Decimal,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tp: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sl: Option<Decimal>,
}

impl TradeRecord {
    pub fn from_order(request: &OrderRequest, ts: DateTime<Utc>) -> Self {
        Self {
            ts: ts.timestamp_millis(),
            symbol: request.symbol.clone(),
            side: request.side,
            qty: request.quantity,
            entry: request.limit_price,
            tp: request.take_profit,
            sl: request.stop_loss,
        }
    }
}

pub trait TradeLogger: Send + Sync {
    fn record(&self, record: &TradeRecord) -> std::io::Result<()>;
}
