use async_trait::async_trait;

use crate::error::PairTradeError;
use crate::ports::paper_broker::PaperBroker;
use crate::ports::{ExecutionGateway, HeldPosition, OpenOrder, OrderHandle};
use crate::rate_limit_notifier::{is_rate_limit_error, notify_rate_limit};
use crate::strategy::risk::OrderRequest;

/// Gateway selected by name, wrapped so rate-limit failures get reported.
pub struct GatewayBox {
    pub inner: Box<dyn ExecutionGateway>,
}

impl GatewayBox {
    pub fn new(inner: Box<dyn ExecutionGateway>) -> Self {
        Self { inner }
    }

    // true when a report went out; throttled repeats and other errors are false
    fn report_rate_limit(&self, operation: &str, detail: &str, err: &PairTradeError) -> bool {
        let err_text = err.to_string();
        if !is_rate_limit_error(&err_text) {
            return false;
        }
        let context = format!("{} ({})", operation, detail);
        notify_rate_limit(&context, &err_text)
    }

    pub fn create(
        gateway_name: &str,
        paper_state_file: Option<&str>,
    ) -> Result<Self, PairTradeError> {
        match gateway_name {
            "paper" => {
                let broker = match paper_state_file {
                    Some(path) => PaperBroker::open(path)?,
                    None => PaperBroker::new(),
                };
                Ok(GatewayBox {
                    inner: Box::new(broker),
                })
            }
            _ => Err(PairTradeError::Gateway(format!(
                "Unsupported gateway: {}",
                gateway_name
            ))),
        }
    }
}

#[async_trait]
impl ExecutionGateway for GatewayBox {
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderHandle, PairTradeError> {
        let result = self.inner.submit_order(request).await;
        if let Err(ref err) = result {
            self.report_rate_limit(
                "submit_order",
                &format!(
                    "{} | side={} | qty={}",
                    request.symbol, request.side, request.quantity
                ),
                err,
            );
        }
        result
    }

    async fn get_held_quantity(&self, symbol: &str) -> Result<i64, PairTradeError> {
        let result = self.inner.get_held_quantity(symbol).await;
        if let Err(ref err) = result {
            self.report_rate_limit("get_held_quantity", symbol, err);
        }
        result
    }

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, PairTradeError> {
        let result = self.inner.list_open_orders(symbol).await;
        if let Err(ref err) = result {
            self.report_rate_limit("list_open_orders", symbol.unwrap_or("all"), err);
        }
        result
    }

    async fn list_positions(&self) -> Result<Vec<HeldPosition>, PairTradeError> {
        let result = self.inner.list_positions().await;
        if let Err(ref err) = result {
            self.report_rate_limit("list_positions", "all", err);
        }
        result
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), PairTradeError> {
        let result = self.inner.cancel_order(order_id).await;
        if let Err(ref err) = result {
            self.report_rate_limit("cancel_order", order_id, err);
        }
        result
    }

    async fn cancel_all_orders(&self, symbol: Option<&str>) -> Result<usize, PairTradeError> {
        let result = self.inner.cancel_all_orders(symbol).await;
        if let Err(ref err) = result {
            self.report_rate_limit("cancel_all_orders", symbol.unwrap_or("all"), err);
        }
        result
    }

    async fn close_position(&self, symbol: &str) -> Result<Option<OrderHandle>, PairTradeError> {
        let result = self.inner.close_position(symbol).await;
        if let Err(ref err) = result {
            self.report_rate_limit("close_position", symbol, err);
        }
        result
    }

    async fn close_all_positions(&self) -> Result<usize, PairTradeError> {
        let result = self.inner.close_all_positions().await;
        if let Err(ref err) = result {
            self.report_rate_limit("close_all_positions", "all", err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::position::Side;
    use rust_decimal_macros::dec;

    // Venue that fails every call with the same error text.
    struct FailingVenue(&'static str);

    impl FailingVenue {
        fn fail<T>(&self) -> Result<T, PairTradeError> {
            Err(PairTradeError::Gateway(self.0.to_string()))
        }
    }

    #[async_trait]
    impl ExecutionGateway for FailingVenue {
        async fn submit_order(&self, _request: &OrderRequest) -> Result<OrderHandle, PairTradeError> {
            self.fail()
        }

        async fn get_held_quantity(&self, _symbol: &str) -> Result<i64, PairTradeError> {
            self.fail()
        }

        async fn list_open_orders(
            &self,
            _symbol: Option<&str>,
        ) -> Result<Vec<OpenOrder>, PairTradeError> {
            self.fail()
        }

        async fn list_positions(&self) -> Result<Vec<HeldPosition>, PairTradeError> {
            self.fail()
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<(), PairTradeError> {
            self.fail()
        }

        async fn cancel_all_orders(&self, _symbol: Option<&str>) -> Result<usize, PairTradeError> {
            self.fail()
        }

        async fn close_position(&self, _symbol: &str) -> Result<Option<OrderHandle>, PairTradeError> {
            self.fail()
        }

        async fn close_all_positions(&self) -> Result<usize, PairTradeError> {
            self.fail()
        }
    }

    #[tokio::test]
    async fn rate_limited_calls_are_reported_once_per_window() {
        let gateway = GatewayBox::new(Box::new(FailingVenue("HTTP 429 Too Many Requests")));
        let err = gateway.get_held_quantity("RLTEST1").await.unwrap_err();
        assert!(is_rate_limit_error(&err.to_string()));

        // the decorator already reported this context, so a repeat is throttled
        assert!(!notify_rate_limit("get_held_quantity (RLTEST1)", "429"));
        assert!(!gateway.report_rate_limit("get_held_quantity", "RLTEST1", &err));
        // a different operation is its own context
        assert!(gateway.report_rate_limit("cancel_order", "RLTEST1", &err));
    }

    #[tokio::test]
    async fn other_gateway_errors_are_not_reported() {
        let gateway = GatewayBox::new(Box::new(FailingVenue("connection reset")));
        let err = gateway.close_position("RLTEST2").await.unwrap_err();
        assert_eq!(err, PairTradeError::Gateway("connection reset".to_string()));
        assert!(!gateway.report_rate_limit("close_position", "RLTEST2", &err));
        // nothing was recorded for the context
        assert!(notify_rate_limit("close_position (RLTEST2)", "429"));
    }

    #[test]
    fn unknown_gateway_is_rejected() {
        let err = GatewayBox::create("ibkr", None).err().unwrap();
        assert!(err.to_string().contains("Unsupported gateway"));
    }

    #[tokio::test]
    async fn paper_gateway_delegates_to_the_broker() {
        let gateway = GatewayBox::create("paper", None).unwrap();
        gateway
            .submit_order(&OrderRequest {
                symbol: "AAA".to_string(),
                quantity: 4,
                side: Side::Sell,
                limit_price: dec!(1.5),
                take_profit: None,
                stop_loss: None,
            })
            .await
            .unwrap();
        assert_eq!(gateway.get_held_quantity("AAA").await.unwrap(), -4);
        assert_eq!(gateway.close_all_positions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn paper_state_file_is_used_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.json");
        let path_str = path.to_str().unwrap();
        {
            let gateway = GatewayBox::create("paper", Some(path_str)).unwrap();
            gateway
                .submit_order(&OrderRequest {
                    symbol: "AAA".to_string(),
                    quantity: 2,
                    side: Side::Buy,
                    limit_price: dec!(10),
                    take_profit: None,
                    stop_loss: None,
                })
                .await
                .unwrap();
        }
        let gateway = GatewayBox::create("paper", Some(path_str)).unwrap();
        assert_eq!(gateway.get_held_quantity("AAA").await.unwrap(), 2);
    }
}
