use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::PairTradeError;
use crate::strategy::position::{Side, TradeIntent};

pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 2.0;
pub const DEFAULT_STOP_LOSS_PCT: f64 = 1.0;
pub const DEFAULT_LIMIT_OFFSET_BPS: u32 = 10;

const PRICE_DECIMALS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub limit_offset_bps: u32,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            limit_offset_bps: DEFAULT_LIMIT_OFFSET_BPS,
        }
    }
}

/// Limit order, optionally bracketed by a take-profit and a stop-loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: i64,
    pub side: Side,
    pub limit_price: Decimal,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

impl OrderRequest {
    pub fn is_bracket(&self) -> bool {
        self.take_profit.is_some() && self.stop_loss.is_some()
    }
}

fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointNearestEven)
}

fn pct_to_fraction(pct: f64, what: &str) -> Result<Decimal, PairTradeError> {
    Decimal::from_f64(pct)
        .map(|d| d / Decimal::ONE_HUNDRED)
        .ok_or_else(|| PairTradeError::Config(format!("{} percent {} is not representable", what, pct)))
}

#[derive(Debug, Clone)]
pub struct RiskOrderBuilder {
    params: RiskParams,
}

impl RiskOrderBuilder {
    pub fn new(params: RiskParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    /// Prices an intent off the latest market price.
    ///
    /// Buys are placed `limit_offset_bps` above the market and sells below it.
    /// Entry intents get a take-profit and stop-loss measured from the rounded
    /// entry price; exit intents are plain limit orders.
    pub fn build(&self, intent: &TradeIntent, market_price: f64) -> Result<OrderRequest, PairTradeError> {
        if intent.quantity <= 0 {
            return Err(PairTradeError::InvalidQuantity {
                symbol: intent.symbol.clone(),
                quantity: intent.quantity,
            });
        }
        if !market_price.is_finite() || market_price <= 0.0 {
            return Err(PairTradeError::data_fetch(
                &intent.symbol,
                format!("unusable market price {}", market_price),
            ));
        }
        let market = Decimal::from_f64(market_price).ok_or_else(|| {
            PairTradeError::data_fetch(&intent.symbol, format!("unrepresentable price {}", market_price))
        })?;

        let offset = Decimal::new(i64::from(self.params.limit_offset_bps), 4);
        let entry = match intent.side {
            Side::Buy => round_price(market * (Decimal::ONE + offset)),
            Side::Sell => round_price(market * (Decimal::ONE - offset)),
        };

        let (take_profit, stop_loss) = if intent.carries_risk() {
            let tp = pct_to_fraction(self.params.take_profit_pct, "take profit")?;
            let sl = pct_to_fraction(self.params.stop_loss_pct, "stop loss")?;
            match intent.side {
                Side::Buy => (
                    Some(round_price(entry * (Decimal::ONE + tp))),
                    Some(round_price(entry * (Decimal::ONE - sl))),
                ),
                Side::Sell => (
                    Some(round_price(entry * (Decimal::ONE - tp))),
                    Some(round_price(entry * (Decimal::ONE + sl))),
                ),
            }
        } else {
            (None, None)
        };

        Ok(OrderRequest {
            symbol: intent.symbol.clone(),
            quantity: intent.quantity,
            side: intent.side,
            limit_price: entry,
            take_profit,
            stop_loss,
        })
    }
}
