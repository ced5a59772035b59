use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::PairTradeError;
use crate::ports::{ExecutionGateway, HeldPosition, OpenOrder, OpenOrderKind, OrderHandle};
use crate::strategy::position::Side;
use crate::strategy::risk::OrderRequest;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PaperPosition {
    quantity: i64,
    avg_entry_price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PaperBook {
    positions: BTreeMap<String, PaperPosition>,
    open_orders: Vec<OpenOrder>,
    last_prices: BTreeMap<String, Decimal>,
}

impl PaperBook {
    fn apply_fill(&mut self, symbol: &str, side: Side, quantity: i64, price: Decimal) {
        let signed = side.sign() * quantity;
        let pos = self.positions.entry(symbol.to_string()).or_default();
        let new_qty = pos.quantity + signed;

        if pos.quantity == 0 || pos.quantity.signum() == signed.signum() {
            let cost = Decimal::from(pos.quantity.abs()) * pos.avg_entry_price
                + Decimal::from(quantity) * price;
            pos.avg_entry_price = cost / Decimal::from(new_qty.abs());
        } else if new_qty != 0 && new_qty.signum() != pos.quantity.signum() {
            // flipped through zero: the remainder was opened at this fill
            pos.avg_entry_price = price;
        }
        pos.quantity = new_qty;

        if new_qty == 0 {
            self.positions.remove(symbol);
            // nothing left for a bracket to close
            self.open_orders.retain(|o| o.symbol != symbol);
        }
        self.last_prices.insert(symbol.to_string(), price);
    }

    fn remove_order_group(&mut self, order_id: &str) -> usize {
        let linked = self
            .open_orders
            .iter()
            .find(|o| o.order_id == order_id)
            .and_then(|o| o.linked_order_id.clone());
        let before = self.open_orders.len();
        self.open_orders
            .retain(|o| o.order_id != order_id && Some(&o.order_id) != linked.as_ref());
        before - self.open_orders.len()
    }

    fn remove_orders_for(&mut self, symbol: Option<&str>) -> usize {
        let before = self.open_orders.len();
        self.open_orders
            .retain(|o| symbol.map(|s| o.symbol != s).unwrap_or(false));
        before - self.open_orders.len()
    }
}

fn new_order_id() -> String {
    format!("paper-{:016x}", rand::random::<u64>())
}

/// Simulated broker. Orders fill immediately at their limit price; bracket
/// legs are parked as a linked take-profit/stop-loss pair where cancelling
/// either leg cancels both.
#[derive(Debug, Default)]
pub struct PaperBroker {
    book: Mutex<PaperBook>,
    state_path: Option<PathBuf>,
    rejected_symbols: HashSet<String>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a broker whose book is persisted as JSON at `path`, loading any
    /// book left there by a previous run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PairTradeError> {
        let path = path.into();
        let book = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let book: PaperBook = serde_json::from_str(&raw)?;
            log::info!(
                "[PAPER] restored {} positions and {} open orders from {}",
                book.positions.len(),
                book.open_orders.len(),
                path.display()
            );
            book
        } else {
            PaperBook::default()
        };
        Ok(Self {
            book: Mutex::new(book),
            state_path: Some(path),
            rejected_symbols: HashSet::new(),
        })
    }

    /// Every call touching `symbol` fails, as if the venue were rejecting it.
    pub fn with_rejected_symbol(mut self, symbol: &str) -> Self {
        self.rejected_symbols.insert(symbol.to_string());
        self
    }

    /// Overwrites the held quantity for `symbol`, keeping its entry price.
    #[cfg(test)]
    pub fn set_held_quantity(&self, symbol: &str, quantity: i64) {
        let Ok(mut book) = self.book.lock() else {
            return;
        };
        if quantity == 0 {
            book.positions.remove(symbol);
        } else {
            book.positions.entry(symbol.to_string()).or_default().quantity = quantity;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperBook>, PairTradeError> {
        self.book
            .lock()
            .map_err(|_| PairTradeError::Gateway("paper book lock poisoned".to_string()))
    }

    fn persist(&self, book: &PaperBook) -> Result<(), PairTradeError> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(book)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), PairTradeError> {
        if self.rejected_symbols.contains(symbol) {
            return Err(PairTradeError::Gateway(format!(
                "paper venue rejected {}",
                symbol
            )));
        }
        Ok(())
    }

    fn close_locked(&self, book: &mut PaperBook, symbol: &str) -> Option<OrderHandle> {
        book.remove_orders_for(Some(symbol));
        let pos = book.positions.get(symbol)?.clone();
        if pos.quantity == 0 {
            return None;
        }
        let price = book
            .last_prices
            .get(symbol)
            .copied()
            .unwrap_or(pos.avg_entry_price);
        let side = if pos.quantity > 0 { Side::Sell } else { Side::Buy };
        book.apply_fill(symbol, side, pos.quantity.abs(), price);
        log::info!(
            "[PAPER_FILL] close symbol={} side={} qty={} price={}",
            symbol,
            side,
            pos.quantity.abs(),
            price
        );
        Some(OrderHandle {
            order_id: new_order_id(),
            symbol: symbol.to_string(),
        })
    }
}

#[async_trait]
impl ExecutionGateway for PaperBroker {
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderHandle, PairTradeError> {
        if request.quantity <= 0 {
            return Err(PairTradeError::InvalidQuantity {
                symbol: request.symbol.clone(),
                quantity: request.quantity,
            });
        }
        self.check_symbol(&request.symbol)
            .map_err(|e| PairTradeError::order_submission(&request.symbol, e))?;
        if request.limit_price <= Decimal::ZERO {
            return Err(PairTradeError::order_submission(
                &request.symbol,
                format!("non-positive limit price {}", request.limit_price),
            ));
        }

        let mut book = self.lock()?;
        book.apply_fill(
            &request.symbol,
            request.side,
            request.quantity,
            request.limit_price,
        );
        let order_id = new_order_id();
        log::info!(
            "[PAPER_FILL] id={} symbol={} side={} qty={} price={}",
            order_id,
            request.symbol,
            request.side,
            request.quantity,
            request.limit_price
        );

        if let (Some(tp), Some(sl)) = (request.take_profit, request.stop_loss) {
            let tp_id = format!("{}-tp", order_id);
            let sl_id = format!("{}-sl", order_id);
            let exit_side = request.side.opposite();
            let now = Utc::now();
            for (id, sibling, kind, price) in [
                (&tp_id, &sl_id, OpenOrderKind::TakeProfit, tp),
                (&sl_id, &tp_id, OpenOrderKind::StopLoss, sl),
            ] {
                book.open_orders.push(OpenOrder {
                    order_id: id.clone(),
                    symbol: request.symbol.clone(),
                    side: exit_side,
                    quantity: request.quantity,
                    kind,
                    price,
                    linked_order_id: Some(sibling.clone()),
                    created_at: now,
                });
            }
        }

        self.persist(&book)?;
        Ok(OrderHandle {
            order_id,
            symbol: request.symbol.clone(),
        })
    }

    async fn get_held_quantity(&self, symbol: &str) -> Result<i64, PairTradeError> {
        self.check_symbol(symbol)?;
        let book = self.lock()?;
        Ok(book.positions.get(symbol).map(|p| p.quantity).unwrap_or(0))
    }

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, PairTradeError> {
        let book = self.lock()?;
        Ok(book
            .open_orders
            .iter()
            .filter(|o| symbol.map(|s| o.symbol == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn list_positions(&self) -> Result<Vec<HeldPosition>, PairTradeError> {
        let book = self.lock()?;
        Ok(book
            .positions
            .iter()
            .filter(|(_, p)| p.quantity != 0)
            .map(|(symbol, p)| HeldPosition {
                symbol: symbol.clone(),
                quantity: p.quantity,
                avg_entry_price: p.avg_entry_price,
            })
            .collect())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), PairTradeError> {
        let mut book = self.lock()?;
        if book.remove_order_group(order_id) == 0 {
            return Err(PairTradeError::Gateway(format!(
                "order {} not found",
                order_id
            )));
        }
        self.persist(&book)
    }

    async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<usize, PairTradeError> {
        let mut book = self.lock()?;
        let removed = book.remove_orders_for(symbol);
        self.persist(&book)?;
        Ok(removed)
    }

    async fn close_position(&self, symbol: &str) -> Result<Option<OrderHandle>, PairTradeError> {
        self.check_symbol(symbol)?;
        let mut book = self.lock()?;
        let handle = self.close_locked(&mut book, symbol);
        self.persist(&book)?;
        Ok(handle)
    }

    async fn close_all_positions(&self) -> Result<usize, PairTradeError> {
        let mut book = self.lock()?;
        let symbols: Vec<String> = book
            .positions
            .iter()
            .filter(|(_, p)| p.quantity != 0)
            .map(|(s, _)| s.clone())
            .filter(|s| !self.rejected_symbols.contains(s))
            .collect();
        let mut closed = 0;
        for symbol in symbols {
            if self.close_locked(&mut book, &symbol).is_some() {
                closed += 1;
            }
        }
        self.persist(&book)?;
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(symbol: &str, side: Side, quantity: i64, price: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: symbol.to_string(),
            quantity,
            side,
            limit_price: price,
            take_profit: None,
            stop_loss: None,
        }
    }

    fn bracket(symbol: &str, side: Side, quantity: i64) -> OrderRequest {
        OrderRequest {
            take_profit: Some(dec!(102.10)),
            stop_loss: Some(dec!(99.10)),
            ..order(symbol, side, quantity, dec!(100.10))
        }
    }

    #[tokio::test]
    async fn fills_move_signed_quantity() {
        let broker = PaperBroker::new();
        broker
            .submit_order(&order("AAA", Side::Buy, 10, dec!(100)))
            .await
            .unwrap();
        broker
            .submit_order(&order("BBB", Side::Sell, 15, dec!(50)))
            .await
            .unwrap();
        assert_eq!(broker.get_held_quantity("AAA").await.unwrap(), 10);
        assert_eq!(broker.get_held_quantity("BBB").await.unwrap(), -15);
        assert_eq!(broker.get_held_quantity("CCC").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn average_entry_price_is_size_weighted() {
        let broker = PaperBroker::new();
        broker
            .submit_order(&order("AAA", Side::Buy, 10, dec!(100)))
            .await
            .unwrap();
        broker
            .submit_order(&order("AAA", Side::Buy, 30, dec!(104)))
            .await
            .unwrap();
        let positions = broker.list_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].quantity, 40);
        assert_eq!(positions[0].avg_entry_price, dec!(103));

        broker
            .submit_order(&order("AAA", Side::Sell, 50, dec!(110)))
            .await
            .unwrap();
        let positions = broker.list_positions().await.unwrap();
        assert_eq!(positions[0].quantity, -10);
        assert_eq!(positions[0].avg_entry_price, dec!(110));
    }

    #[tokio::test]
    async fn bracket_parks_linked_exit_orders() {
        let broker = PaperBroker::new();
        broker.submit_order(&bracket("AAA", Side::Buy, 10)).await.unwrap();
        let orders = broker.list_open_orders(Some("AAA")).await.unwrap();
        assert_eq!(orders.len(), 2);
        let tp = orders
            .iter()
            .find(|o| o.kind == OpenOrderKind::TakeProfit)
            .unwrap();
        let sl = orders
            .iter()
            .find(|o| o.kind == OpenOrderKind::StopLoss)
            .unwrap();
        assert_eq!(tp.side, Side::Sell);
        assert_eq!(tp.price, dec!(102.10));
        assert_eq!(sl.price, dec!(99.10));
        assert_eq!(tp.linked_order_id.as_deref(), Some(sl.order_id.as_str()));
        assert_eq!(sl.linked_order_id.as_deref(), Some(tp.order_id.as_str()));
    }

    #[tokio::test]
    async fn cancelling_one_bracket_leg_cancels_both() {
        let broker = PaperBroker::new();
        broker.submit_order(&bracket("AAA", Side::Buy, 10)).await.unwrap();
        broker.submit_order(&bracket("BBB", Side::Sell, 5)).await.unwrap();
        let sl_id = broker
            .list_open_orders(Some("AAA"))
            .await
            .unwrap()
            .into_iter()
            .find(|o| o.kind == OpenOrderKind::StopLoss)
            .unwrap()
            .order_id;
        broker.cancel_order(&sl_id).await.unwrap();
        assert!(broker.list_open_orders(Some("AAA")).await.unwrap().is_empty());
        assert_eq!(broker.list_open_orders(None).await.unwrap().len(), 2);
        assert!(broker.cancel_order(&sl_id).await.is_err());
    }

    #[tokio::test]
    async fn cancel_all_can_be_scoped_to_a_symbol() {
        let broker = PaperBroker::new();
        broker.submit_order(&bracket("AAA", Side::Buy, 10)).await.unwrap();
        broker.submit_order(&bracket("BBB", Side::Sell, 5)).await.unwrap();
        assert_eq!(broker.cancel_all_orders(Some("BBB")).await.unwrap(), 2);
        assert_eq!(broker.cancel_all_orders(None).await.unwrap(), 2);
        assert!(broker.list_open_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_position_flattens_and_drops_brackets() {
        let broker = PaperBroker::new();
        broker.submit_order(&bracket("AAA", Side::Buy, 10)).await.unwrap();
        let handle = broker.close_position("AAA").await.unwrap();
        assert!(handle.is_some());
        assert_eq!(broker.get_held_quantity("AAA").await.unwrap(), 0);
        assert!(broker.list_open_orders(None).await.unwrap().is_empty());
        assert!(broker.close_position("AAA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_all_positions_counts_closed_symbols() {
        let broker = PaperBroker::new();
        broker
            .submit_order(&order("AAA", Side::Buy, 10, dec!(1.25)))
            .await
            .unwrap();
        broker
            .submit_order(&order("BBB", Side::Sell, 4, dec!(1.10)))
            .await
            .unwrap();
        assert_eq!(broker.close_all_positions().await.unwrap(), 2);
        assert!(broker.list_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_symbol_fails_submission_and_queries() {
        let broker = PaperBroker::new().with_rejected_symbol("AAA");
        let err = broker
            .submit_order(&order("AAA", Side::Buy, 1, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PairTradeError::OrderSubmission { .. }));
        assert!(broker.get_held_quantity("AAA").await.is_err());
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let broker = PaperBroker::new();
        let err = broker
            .submit_order(&order("AAA", Side::Buy, 0, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PairTradeError::InvalidQuantity { .. }));
    }

    #[tokio::test]
    async fn book_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("paper.json");
        {
            let broker = PaperBroker::open(&path).unwrap();
            broker.submit_order(&bracket("AAA", Side::Sell, 3)).await.unwrap();
        }
        let broker = PaperBroker::open(&path).unwrap();
        assert_eq!(broker.get_held_quantity("AAA").await.unwrap(), -3);
        assert_eq!(broker.list_open_orders(None).await.unwrap().len(), 2);
    }
}
