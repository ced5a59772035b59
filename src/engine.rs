use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::config::{PairTradeConfig, RunMode};
use crate::error::PairTradeError;
use crate::ports::replay_feed::ReplayFeed;
use crate::ports::{ExecutionGateway, MarketDataProvider, OrderHandle, TradeLogger, TradeRecord};
use crate::strategy::aligner::align;
use crate::strategy::hedge::{self, HedgeRatio};
use crate::strategy::position::{IntentBatch, PairPositionEngine, PositionState, TradeIntent};
use crate::strategy::risk::{OrderRequest, RiskOrderBuilder};
use crate::strategy::signal::{Signal, SignalThresholds};
use crate::strategy::spread::{compute_spread_rows, SpreadRow};
use crate::trade::execution::gateway_box::GatewayBox;
use crate::trade_log::FileTradeLogger;

// rows echoed by the analyze report
const ANALYSIS_TAIL_ROWS: usize = 5;

/// Output of the analysis stages of one cycle.
#[derive(Debug, Clone)]
pub struct CycleAnalysis {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub hedge: HedgeRatio,
    pub rows: Vec<SpreadRow>,
    pub signals: Vec<Signal>,
}

impl CycleAnalysis {
    pub fn latest(&self) -> Option<(&SpreadRow, Signal)> {
        self.rows.last().zip(self.signals.last().copied())
    }
}

#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub analysis: CycleAnalysis,
    pub batches: Vec<IntentBatch>,
}

impl CyclePlan {
    pub fn intents(&self) -> Vec<TradeIntent> {
        self.batches
            .iter()
            .flat_map(|b| b.intents.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub submitted: Vec<(OrderRequest, OrderHandle)>,
    pub skipped: Vec<(TradeIntent, PairTradeError)>,
}

impl ExecutionReport {
    pub fn extend(&mut self, other: ExecutionReport) {
        self.submitted.extend(other.submitted);
        self.skipped.extend(other.skipped);
    }
}

#[derive(Debug)]
pub struct CycleReport {
    pub plan: CyclePlan,
    pub execution: ExecutionReport,
}

pub struct PairTradeEngine {
    cfg: PairTradeConfig,
    market_data: Arc<dyn MarketDataProvider>,
    gateway: Arc<dyn ExecutionGateway>,
    trade_logger: Option<Arc<dyn TradeLogger>>,
    thresholds: SignalThresholds,
    order_builder: RiskOrderBuilder,
    position: Arc<Mutex<PairPositionEngine>>,
}

impl PairTradeEngine {
    /// Wires the engine from configuration: replay feed, named gateway and
    /// the JSONL trade log unless disabled.
    pub fn new(cfg: PairTradeConfig) -> Result<Self> {
        let data_file = cfg
            .data_file
            .clone()
            .context("DATA_FILE must point at a JSONL price dump")?;
        let market_data = ReplayFeed::open(&data_file)
            .with_context(|| format!("failed to load price data from {}", data_file))?;
        let gateway = GatewayBox::create(&cfg.gateway_name, cfg.paper_state_file.as_deref())
            .with_context(|| format!("failed to create gateway {}", cfg.gateway_name))?;
        let trade_logger: Option<Arc<dyn TradeLogger>> = if cfg.disable_trade_log {
            None
        } else {
            Some(Arc::new(FileTradeLogger::new(&cfg.trade_log_file)))
        };
        Ok(Self::with_components(
            cfg,
            Arc::new(market_data),
            Arc::new(gateway),
            trade_logger,
        ))
    }

    pub fn with_components(
        cfg: PairTradeConfig,
        market_data: Arc<dyn MarketDataProvider>,
        gateway: Arc<dyn ExecutionGateway>,
        trade_logger: Option<Arc<dyn TradeLogger>>,
    ) -> Self {
        let position = PairPositionEngine::new(&cfg.symbol_a, &cfg.symbol_b, cfg.lot_size);
        Self {
            thresholds: cfg.thresholds(),
            order_builder: RiskOrderBuilder::new(cfg.risk_params()),
            position: Arc::new(Mutex::new(position)),
            cfg,
            market_data,
            gateway,
            trade_logger,
        }
    }

    pub fn config(&self) -> &PairTradeConfig {
        &self.cfg
    }

    pub async fn position_state(&self) -> PositionState {
        self.position.lock().await.state()
    }

    /// Fetch, align, estimate, compute the spread and classify. No state changes.
    pub async fn analyze(&self) -> Result<CycleAnalysis, PairTradeError> {
        let (start, end) = self.cfg.resolve_date_range(Utc::now().date_naive());
        let series_a = self
            .market_data
            .get_daily_closes(&self.cfg.symbol_a, start, end)
            .await?;
        let series_b = self
            .market_data
            .get_daily_closes(&self.cfg.symbol_b, start, end)
            .await?;

        let frame = align(&series_a, &series_b, self.cfg.rolling_window)?;
        let hedge = hedge::estimate(&frame, self.cfg.min_correlation)?;
        let rows = compute_spread_rows(&frame, hedge.beta, self.cfg.rolling_window);
        let signals = self.thresholds.classify_rows(&rows);

        let analysis = CycleAnalysis {
            start,
            end,
            hedge,
            rows,
            signals,
        };
        if let Some((row, signal)) = analysis.latest() {
            log::info!(
                "[SIGNAL] {} spread={:.5} z={} -> {}",
                row.ts.format("%Y-%m-%d"),
                row.spread,
                row.z_score
                    .map(|z| format!("{:.3}", z))
                    .unwrap_or_else(|| "n/a".to_string()),
                signal
            );
        }
        Ok(analysis)
    }

    /// Runs the analysis and advances the position state, returning the
    /// intents without executing them.
    pub async fn plan_cycle(&self) -> Result<CyclePlan, PairTradeError> {
        let mut position = self.position.lock().await;
        let analysis = self.analyze().await?;
        let batches = position
            .consume(
                &analysis.rows,
                &analysis.signals,
                analysis.hedge.beta,
                self.gateway.as_ref(),
            )
            .await;
        Ok(CyclePlan { analysis, batches })
    }

    /// Analyzes and trades one cycle. Each batch is executed before the next
    /// row is evaluated, so an exit later in the same history unwinds the
    /// fills of an earlier entry. The position lock is held throughout, so
    /// overlapping cycles queue up.
    pub async fn run_cycle(&self) -> Result<CycleReport, PairTradeError> {
        let mut position = self.position.lock().await;
        log::info!(
            "[CYCLE] start {}/{} state={:?}",
            self.cfg.symbol_a,
            self.cfg.symbol_b,
            position.state()
        );
        let analysis = self.analyze().await?;
        let mut batches = Vec::new();
        let mut execution = ExecutionReport::default();
        for (row, signal) in analysis.rows.iter().zip(analysis.signals.iter()) {
            let Some(batch) = position
                .step(row, *signal, analysis.hedge.beta, self.gateway.as_ref())
                .await
            else {
                continue;
            };
            execution.extend(self.execute_intents(&batch.intents).await);
            batches.push(batch);
        }
        log::info!(
            "[CYCLE] done state={:?} submitted={} skipped={}",
            position.state(),
            execution.submitted.len(),
            execution.skipped.len()
        );
        drop(position);

        self.log_latest_prices().await;
        Ok(CycleReport {
            plan: CyclePlan { analysis, batches },
            execution,
        })
    }

    /// Prices, submits and logs each intent. A failing leg is logged and
    /// skipped; the others still go out.
    pub async fn execute_intents(&self, intents: &[TradeIntent]) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for intent in intents {
            let price = match self.market_data.get_latest_price(&intent.symbol).await {
                Ok(price) => price,
                Err(e) => {
                    log::warn!("[ORDER] {} {} skipped: {}", intent.side, intent.symbol, e);
                    report.skipped.push((intent.clone(), e));
                    continue;
                }
            };
            let request = match self.order_builder.build(intent, price) {
                Ok(request) => request,
                Err(e) => {
                    log::warn!("[ORDER] {} {} rejected: {}", intent.side, intent.symbol, e);
                    report.skipped.push((intent.clone(), e));
                    continue;
                }
            };
            match self.gateway.submit_order(&request).await {
                Ok(handle) => {
                    log::info!(
                        "[ORDER] id={} {} {} qty={} limit={} tp={:?} sl={:?}",
                        handle.order_id,
                        request.side,
                        request.symbol,
                        request.quantity,
                        request.limit_price,
                        request.take_profit,
                        request.stop_loss
                    );
                    self.record_trade(&request);
                    report.submitted.push((request, handle));
                }
                Err(e) => {
                    log::error!("[ORDER] {} {} failed: {}", request.side, request.symbol, e);
                    report.skipped.push((intent.clone(), e));
                }
            }
        }
        report
    }

    fn record_trade(&self, request: &OrderRequest) {
        let Some(logger) = &self.trade_logger else {
            return;
        };
        let record = TradeRecord::from_order(request, Utc::now());
        if let Err(e) = logger.record(&record) {
            log::warn!("[TRADE_LOG] failed to record {}: {}", request.symbol, e);
        }
    }

    pub async fn log_latest_prices(&self) {
        for symbol in [&self.cfg.symbol_a, &self.cfg.symbol_b] {
            match self.market_data.get_latest_price(symbol).await {
                Ok(price) => log::info!("[PRICE] {} latest={:.5}", symbol, price),
                Err(e) => log::warn!("[PRICE] {} unavailable: {}", symbol, e),
            }
        }
    }

    fn log_cycle_error(&self, err: &PairTradeError) {
        if err.aborts_cycle() {
            log::warn!("[CYCLE] skipped: {}", err);
        } else {
            log::error!("[CYCLE] failed: {}", err);
        }
    }

    fn report_analysis(&self, analysis: &CycleAnalysis) {
        log::info!(
            "[ANALYZE] {}/{} {}..{} rows={} beta={:.4} correlation={:.4}",
            self.cfg.symbol_a,
            self.cfg.symbol_b,
            analysis.start,
            analysis.end,
            analysis.rows.len(),
            analysis.hedge.beta,
            analysis.hedge.correlation
        );
        let tail = analysis.rows.len().saturating_sub(ANALYSIS_TAIL_ROWS);
        for (row, signal) in analysis.rows[tail..]
            .iter()
            .zip(analysis.signals[tail..].iter())
        {
            log::info!(
                "[ANALYZE] {} spread={:.5} mean={:?} std={:?} z={:?} signal={}",
                row.ts.format("%Y-%m-%d"),
                row.spread,
                row.rolling_mean,
                row.rolling_std,
                row.z_score,
                signal
            );
        }
    }

    /// Runs one cycle per `period` until `shutdown` resolves. A cycle in
    /// progress always completes. Returns the number of cycles started.
    pub async fn run_scheduled<F>(&self, period: Duration, shutdown: F) -> usize
    where
        F: Future,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("[CYCLE] shutdown requested; no further cycles scheduled");
                    break;
                }
                _ = ticker.tick() => {
                    cycles += 1;
                    if let Err(e) = self.run_cycle().await {
                        self.log_cycle_error(&e);
                    }
                }
            }
        }
        cycles
    }

    pub async fn run(&self) -> Result<()> {
        log::info!(
            "[CONFIG] pair={}/{} window={} entry_z={} exit_z={} lot={} gateway={} mode={:?}",
            self.cfg.symbol_a,
            self.cfg.symbol_b,
            self.cfg.rolling_window,
            self.cfg.entry_z,
            self.cfg.exit_z,
            self.cfg.lot_size,
            self.cfg.gateway_name,
            self.cfg.run_mode
        );
        match self.cfg.run_mode {
            RunMode::Analyze => {
                let analysis = self.analyze().await?;
                self.report_analysis(&analysis);
            }
            RunMode::Once => {
                if let Err(e) = self.run_cycle().await {
                    self.log_cycle_error(&e);
                }
            }
            RunMode::Auto => {
                let period = Duration::from_secs(self.cfg.interval_secs);
                log::info!("[CYCLE] scheduling a cycle every {}s", self.cfg.interval_secs);
                let cycles = self
                    .run_scheduled(period, async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            log::error!("failed to listen for ctrl-c: {}", e);
                            std::future::pending::<()>().await;
                        }
                    })
                    .await;
                log::info!("[CYCLE] stopped after {} cycles", cycles);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::paper_broker::PaperBroker;
    use crate::strategy::aligner::{PricePoint, PriceSeries};
    use crate::strategy::position::{hedge_quantity, IntentKind, PositionDirection, Side};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::collections::HashMap;

    const ROWS: usize = 200;

    struct StaticMarket {
        closes: std::sync::Mutex<HashMap<String, Vec<f64>>>,
    }

    impl StaticMarket {
        fn new(a: Vec<f64>, b: Vec<f64>) -> Self {
            let mut closes = HashMap::new();
            closes.insert("AAA".to_string(), a);
            closes.insert("BBB".to_string(), b);
            Self {
                closes: std::sync::Mutex::new(closes),
            }
        }

        fn push(&self, a: f64, b: f64) {
            let mut closes = self.closes.lock().unwrap();
            closes.get_mut("AAA").unwrap().push(a);
            closes.get_mut("BBB").unwrap().push(b);
        }
    }

    #[async_trait]
    impl MarketDataProvider for StaticMarket {
        async fn get_daily_closes(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, PairTradeError> {
            let closes = self.closes.lock().unwrap();
            let prices = closes
                .get(symbol)
                .ok_or_else(|| PairTradeError::data_fetch(symbol, "unknown symbol"))?;
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let points = prices
                .iter()
                .enumerate()
                .map(|(i, &price)| PricePoint {
                    ts: start + ChronoDuration::days(i as i64),
                    price,
                })
                .collect();
            Ok(PriceSeries::new(symbol, points))
        }

        async fn get_latest_price(&self, symbol: &str) -> Result<f64, PairTradeError> {
            let closes = self.closes.lock().unwrap();
            closes
                .get(symbol)
                .and_then(|p| p.last().copied())
                .ok_or_else(|| PairTradeError::data_fetch(symbol, "unknown symbol"))
        }
    }

    // A tracks 1.5 * B with a small alternating residual; the final A close
    // jumps so the last z-score sits far above the entry band.
    fn spiking_pair() -> (Vec<f64>, Vec<f64>) {
        let b: Vec<f64> = (0..ROWS).map(|i| 50.0 + i as f64).collect();
        let mut a: Vec<f64> = b
            .iter()
            .enumerate()
            .map(|(i, v)| 1.5 * v + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        a[ROWS - 1] += 5.0;
        (a, b)
    }

    fn test_config() -> PairTradeConfig {
        PairTradeConfig {
            symbol_a: "AAA".to_string(),
            symbol_b: "BBB".to_string(),
            disable_trade_log: true,
            ..PairTradeConfig::default()
        }
    }

    fn engine_with(
        market: Arc<StaticMarket>,
        broker: Arc<PaperBroker>,
        logger: Option<Arc<dyn TradeLogger>>,
    ) -> PairTradeEngine {
        PairTradeEngine::with_components(test_config(), market, broker, logger)
    }

    #[tokio::test]
    async fn spike_opens_short_spread_with_bracketed_orders() {
        let (a, b) = spiking_pair();
        let market = Arc::new(StaticMarket::new(a, b));
        let broker = Arc::new(PaperBroker::new());
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("trades.jsonl");
        let logger: Arc<dyn TradeLogger> = Arc::new(FileTradeLogger::new(&log_path));
        let engine = engine_with(market, broker.clone(), Some(logger));

        let report = engine.run_cycle().await.unwrap();
        let (last_row, last_signal) = report.plan.analysis.latest().unwrap();
        assert!(last_row.z_score.unwrap() > 2.0);
        assert_eq!(last_signal, Signal::Short);

        let hedge_qty = hedge_quantity(10, report.plan.analysis.hedge.beta);
        assert_eq!(hedge_qty, 15);
        let intents = report.plan.intents();
        assert_eq!(intents.len(), 2);
        assert_eq!((intents[0].side, intents[0].quantity), (Side::Sell, 10));
        assert_eq!((intents[1].side, intents[1].quantity), (Side::Buy, hedge_qty));
        assert!(intents.iter().all(|i| i.kind == IntentKind::Entry));

        assert_eq!(report.execution.submitted.len(), 2);
        assert!(report.execution.submitted.iter().all(|(o, _)| o.is_bracket()));
        assert_eq!(
            engine.position_state().await,
            PositionState::Open(PositionDirection::ShortSpread)
        );
        assert_eq!(broker.get_held_quantity("AAA").await.unwrap(), -10);
        assert_eq!(broker.get_held_quantity("BBB").await.unwrap(), hedge_qty);
        assert_eq!(broker.list_open_orders(None).await.unwrap().len(), 4);

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test]
    async fn rerun_without_new_rows_emits_nothing_then_reversion_exits() {
        let (a, b) = spiking_pair();
        let market = Arc::new(StaticMarket::new(a, b));
        let broker = Arc::new(PaperBroker::new());
        let engine = engine_with(market.clone(), broker.clone(), None);

        engine.run_cycle().await.unwrap();
        let again = engine.run_cycle().await.unwrap();
        assert!(again.plan.batches.is_empty());
        assert!(again.execution.submitted.is_empty());

        // next close sits right on the hedge line
        market.push(1.5 * 250.0, 250.0);
        let exit = engine.run_cycle().await.unwrap();
        assert_eq!(exit.plan.batches.len(), 1);
        assert_eq!(exit.plan.batches[0].signal, Signal::Exit);
        let intents = exit.plan.intents();
        assert!(intents.iter().all(|i| i.kind == IntentKind::Exit));
        assert_eq!(engine.position_state().await, PositionState::Flat);
        assert_eq!(broker.get_held_quantity("AAA").await.unwrap(), 0);
        assert_eq!(broker.get_held_quantity("BBB").await.unwrap(), 0);
        assert!(broker.list_open_orders(None).await.unwrap().is_empty());
        assert!(exit.execution.submitted.iter().all(|(o, _)| !o.is_bracket()));
    }

    #[tokio::test]
    async fn exit_in_the_same_history_unwinds_the_filled_entry() {
        // spike mid-history, then straight back onto the hedge line
        let (mut a, b) = spiking_pair();
        a[ROWS - 1] -= 5.0;
        a[100] += 5.0;
        let broker = Arc::new(PaperBroker::new());
        let engine = engine_with(Arc::new(StaticMarket::new(a, b)), broker.clone(), None);

        let report = engine.run_cycle().await.unwrap();
        let signals: Vec<Signal> = report.plan.batches.iter().map(|b| b.signal).collect();
        assert_eq!(signals, vec![Signal::Short, Signal::Exit]);

        let entry = &report.plan.batches[0].intents;
        let exit = &report.plan.batches[1].intents;
        assert_eq!(exit.len(), entry.len());
        for (open, close) in entry.iter().zip(exit.iter()) {
            assert_eq!(close.symbol, open.symbol);
            assert_eq!(close.side, open.side.opposite());
            assert_eq!(close.quantity, open.quantity);
            assert_eq!(close.kind, IntentKind::Exit);
        }
        assert_eq!(report.execution.submitted.len(), 4);

        assert_eq!(engine.position_state().await, PositionState::Flat);
        assert_eq!(broker.get_held_quantity("AAA").await.unwrap(), 0);
        assert_eq!(broker.get_held_quantity("BBB").await.unwrap(), 0);
        assert!(broker.list_open_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn weak_correlation_aborts_without_trading() {
        let b: Vec<f64> = (0..ROWS).map(|i| 50.0 + i as f64).collect();
        let a: Vec<f64> = (0..ROWS)
            .map(|i| if i % 2 == 0 { 10.0 } else { 12.0 })
            .collect();
        let broker = Arc::new(PaperBroker::new());
        let engine = engine_with(Arc::new(StaticMarket::new(a, b)), broker.clone(), None);

        let err = engine.run_cycle().await.unwrap_err();
        assert!(err.aborts_cycle());
        assert_eq!(engine.position_state().await, PositionState::Flat);
        assert!(broker.list_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_history_is_insufficient_data() {
        let (mut a, mut b) = spiking_pair();
        a.truncate(10);
        b.truncate(10);
        let engine = engine_with(
            Arc::new(StaticMarket::new(a, b)),
            Arc::new(PaperBroker::new()),
            None,
        );
        let err = engine.plan_cycle().await.unwrap_err();
        assert!(matches!(err, PairTradeError::InsufficientData { rows: 10, required: 30 }));
    }

    #[tokio::test]
    async fn failed_leg_is_skipped_and_state_still_commits() {
        let (a, b) = spiking_pair();
        let broker = Arc::new(PaperBroker::new().with_rejected_symbol("BBB"));
        let engine = engine_with(Arc::new(StaticMarket::new(a, b)), broker.clone(), None);

        let report = engine.run_cycle().await.unwrap();
        assert_eq!(report.execution.submitted.len(), 1);
        assert_eq!(report.execution.submitted[0].0.symbol, "AAA");
        assert_eq!(report.execution.skipped.len(), 1);
        assert!(matches!(
            report.execution.skipped[0].1,
            PairTradeError::OrderSubmission { .. }
        ));
        assert!(matches!(
            engine.position_state().await,
            PositionState::Open(PositionDirection::ShortSpread)
        ));
    }

    #[tokio::test]
    async fn plan_cycle_does_not_touch_the_gateway() {
        let (a, b) = spiking_pair();
        let broker = Arc::new(PaperBroker::new());
        let engine = engine_with(Arc::new(StaticMarket::new(a, b)), broker.clone(), None);

        let plan = engine.plan_cycle().await.unwrap();
        assert_eq!(plan.intents().len(), 2);
        assert!(broker.list_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduler_stops_after_shutdown() {
        let (a, b) = spiking_pair();
        let engine = engine_with(
            Arc::new(StaticMarket::new(a, b)),
            Arc::new(PaperBroker::new()),
            None,
        );
        let cycles = engine
            .run_scheduled(
                Duration::from_millis(20),
                tokio::time::sleep(Duration::from_millis(70)),
            )
            .await;
        assert!(cycles >= 1);
        assert!(engine.position_state().await != PositionState::Flat);
    }

    #[tokio::test]
    async fn engine_from_config_reads_replay_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("prices.jsonl");
        let mut file = std::fs::File::create(&data_path).unwrap();
        let (a, b) = spiking_pair();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        for i in 0..ROWS {
            let ts = (start + ChronoDuration::days(i as i64)).timestamp_millis();
            let line = serde_json::json!({
                "timestamp": ts,
                "prices": { "AAA": { "price": a[i] }, "BBB": { "price": b[i] } }
            });
            writeln!(file, "{}", line).unwrap();
        }
        drop(file);

        let cfg = PairTradeConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            data_file: Some(data_path.to_string_lossy().to_string()),
            trade_log_file: dir.path().join("log.jsonl").to_string_lossy().to_string(),
            ..test_config()
        };
        let engine = PairTradeEngine::new(cfg).unwrap();
        let analysis = engine.analyze().await.unwrap();
        assert_eq!(analysis.rows.len(), ROWS);
        assert_eq!(analysis.latest().unwrap().1, Signal::Short);
    }

    #[test]
    fn missing_data_file_is_a_config_error() {
        assert!(PairTradeEngine::new(test_config()).is_err());
    }
}
