use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use crate::strategy::hedge::DEFAULT_MIN_CORRELATION;
use crate::strategy::position::DEFAULT_LOT_SIZE;
use crate::strategy::risk::{
    RiskParams, DEFAULT_LIMIT_OFFSET_BPS, DEFAULT_STOP_LOSS_PCT, DEFAULT_TAKE_PROFIT_PCT,
};
use crate::strategy::signal::{SignalThresholds, DEFAULT_ENTRY_Z, DEFAULT_EXIT_Z};
use crate::strategy::spread::DEFAULT_ROLLING_WINDOW;
use crate::trade_log::DEFAULT_TRADE_LOG_FILE;

const DEFAULT_SYMBOL_A: &str = "GBPUSD";
const DEFAULT_SYMBOL_B: &str = "EURUSD";
const DEFAULT_LOOKBACK_DAYS: i64 = 120;
const DEFAULT_INTERVAL_SECS: u64 = 3600;
const DEFAULT_GATEWAY_NAME: &str = "paper";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One analysis/trading cycle, then exit.
    Once,
    /// A cycle every `interval_secs` until interrupted.
    Auto,
    /// Report hedge ratio and signals without touching the gateway.
    Analyze,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(RunMode::Once),
            "auto" => Ok(RunMode::Auto),
            "analyze" | "analyse" => Ok(RunMode::Analyze),
            other => Err(format!("unknown run mode '{}'", other)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PairTradeYaml {
    symbol_a: Option<String>,
    symbol_b: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    lookback_days: Option<i64>,
    rolling_window: Option<usize>,
    min_correlation: Option<f64>,
    entry_z_score: Option<f64>,
    exit_z_score: Option<f64>,
    lot_size: Option<i64>,
    take_profit_pct: Option<f64>,
    stop_loss_pct: Option<f64>,
    limit_offset_bps: Option<u32>,
    interval_secs: Option<u64>,
    run_mode: Option<String>,
    data_file: Option<String>,
    paper_state_file: Option<String>,
    gateway_name: Option<String>,
    trade_log_file: Option<String>,
    disable_trade_log: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PairTradeConfig {
    pub symbol_a: String,
    pub symbol_b: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub lookback_days: i64,
    pub rolling_window: usize,
    pub min_correlation: f64,
    pub entry_z: f64,
    pub exit_z: f64,
    pub lot_size: i64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub limit_offset_bps: u32,
    pub interval_secs: u64,
    pub run_mode: RunMode,
    // JSONL price dump; required by the trading modes only
    pub data_file: Option<String>,
    pub paper_state_file: Option<String>,
    pub gateway_name: String,
    pub trade_log_file: String,
    pub disable_trade_log: bool,
}

impl Default for PairTradeConfig {
    fn default() -> Self {
        Self {
            symbol_a: DEFAULT_SYMBOL_A.to_string(),
            symbol_b: DEFAULT_SYMBOL_B.to_string(),
            start_date: None,
            end_date: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            min_correlation: DEFAULT_MIN_CORRELATION,
            entry_z: DEFAULT_ENTRY_Z,
            exit_z: DEFAULT_EXIT_Z,
            lot_size: DEFAULT_LOT_SIZE,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            limit_offset_bps: DEFAULT_LIMIT_OFFSET_BPS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            run_mode: RunMode::Once,
            data_file: None,
            paper_state_file: None,
            gateway_name: DEFAULT_GATEWAY_NAME.to_string(),
            trade_log_file: DEFAULT_TRADE_LOG_FILE.to_string(),
            disable_trade_log: false,
        }
    }
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("{} must be YYYY-MM-DD, got '{}'", key, value))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl PairTradeConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        let config_path = env::var("PAIRTRADE_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty());
        if let Some(path) = config_path {
            return Self::from_yaml_path(path);
        }
        Self::from_env()
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("failed to open PairTrade config {}", path_ref.display()))?;
        let yaml: PairTradeYaml = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse PairTrade config {}", path_ref.display()))?;

        let mut cfg = Self::from_yaml(yaml)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_yaml(yaml: PairTradeYaml) -> Result<Self> {
        let defaults = Self::default();
        let run_mode = match yaml.run_mode.as_deref() {
            Some(mode) => mode.parse().map_err(anyhow::Error::msg)?,
            None => defaults.run_mode,
        };
        Ok(PairTradeConfig {
            symbol_a: yaml.symbol_a.unwrap_or(defaults.symbol_a),
            symbol_b: yaml.symbol_b.unwrap_or(defaults.symbol_b),
            start_date: yaml.start_date,
            end_date: yaml.end_date,
            lookback_days: yaml.lookback_days.unwrap_or(defaults.lookback_days),
            rolling_window: yaml.rolling_window.unwrap_or(defaults.rolling_window),
            min_correlation: yaml.min_correlation.unwrap_or(defaults.min_correlation),
            entry_z: yaml.entry_z_score.unwrap_or(defaults.entry_z),
            exit_z: yaml.exit_z_score.unwrap_or(defaults.exit_z),
            lot_size: yaml.lot_size.unwrap_or(defaults.lot_size),
            take_profit_pct: yaml.take_profit_pct.unwrap_or(defaults.take_profit_pct),
            stop_loss_pct: yaml.stop_loss_pct.unwrap_or(defaults.stop_loss_pct),
            limit_offset_bps: yaml.limit_offset_bps.unwrap_or(defaults.limit_offset_bps),
            interval_secs: yaml.interval_secs.unwrap_or(defaults.interval_secs),
            run_mode,
            data_file: yaml.data_file,
            paper_state_file: yaml.paper_state_file,
            gateway_name: yaml.gateway_name.unwrap_or(defaults.gateway_name),
            trade_log_file: yaml.trade_log_file.unwrap_or(defaults.trade_log_file),
            disable_trade_log: yaml.disable_trade_log.unwrap_or(defaults.disable_trade_log),
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Blank values are ignored and numeric
    /// values that fail to parse are logged and skipped.
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        fn parsed<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    log::warn!("ignoring {}='{}': not a valid value", key, value);
                    None
                }
            }
        }

        if let Some(value) = get("SYMBOL_A") {
            self.symbol_a = value.trim().to_string();
        }
        if let Some(value) = get("SYMBOL_B") {
            self.symbol_b = value.trim().to_string();
        }
        if let Some(value) = get("START_DATE") {
            self.start_date = Some(parse_date("START_DATE", &value)?);
        }
        if let Some(value) = get("END_DATE") {
            self.end_date = Some(parse_date("END_DATE", &value)?);
        }
        if let Some(v) = parsed("LOOKBACK_DAYS", get("LOOKBACK_DAYS")) {
            self.lookback_days = v;
        }
        if let Some(v) = parsed("ROLLING_WINDOW", get("ROLLING_WINDOW")) {
            self.rolling_window = v;
        }
        if let Some(v) = parsed("MIN_CORRELATION", get("MIN_CORRELATION")) {
            self.min_correlation = v;
        }
        if let Some(v) = parsed("ENTRY_Z_SCORE", get("ENTRY_Z_SCORE")) {
            self.entry_z = v;
        }
        if let Some(v) = parsed("EXIT_Z_SCORE", get("EXIT_Z_SCORE")) {
            self.exit_z = v;
        }
        if let Some(v) = parsed("LOT_SIZE", get("LOT_SIZE")) {
            self.lot_size = v;
        }
        if let Some(v) = parsed("TAKE_PROFIT_PCT", get("TAKE_PROFIT_PCT")) {
            self.take_profit_pct = v;
        }
        if let Some(v) = parsed("STOP_LOSS_PCT", get("STOP_LOSS_PCT")) {
            self.stop_loss_pct = v;
        }
        if let Some(v) = parsed("LIMIT_OFFSET_BPS", get("LIMIT_OFFSET_BPS")) {
            self.limit_offset_bps = v;
        }
        if let Some(v) = parsed("INTERVAL_SECS", get("INTERVAL_SECS")) {
            self.interval_secs = v;
        }
        if let Some(value) = get("RUN_MODE") {
            self.run_mode = value.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(value) = get("DATA_FILE") {
            self.data_file = Some(value);
        }
        if let Some(value) = get("PAPER_STATE_FILE") {
            self.paper_state_file = Some(value);
        }
        if let Some(value) = get("GATEWAY_NAME") {
            self.gateway_name = value.trim().to_ascii_lowercase();
        }
        if let Some(value) = get("TRADE_LOG_FILE") {
            self.trade_log_file = value;
        }
        if let Some(value) = get("DISABLE_TRADE_LOG") {
            self.disable_trade_log = parse_bool(&value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol_a.is_empty() || self.symbol_b.is_empty() {
            bail!("both SYMBOL_A and SYMBOL_B must be set");
        }
        if self.symbol_a == self.symbol_b {
            bail!("SYMBOL_A and SYMBOL_B must differ (both are {})", self.symbol_a);
        }
        if self.rolling_window < 2 {
            bail!("rolling window must be at least 2, got {}", self.rolling_window);
        }
        if self.lot_size < 1 {
            bail!("lot size must be at least 1, got {}", self.lot_size);
        }
        if self.lookback_days < 1 {
            bail!("lookback days must be at least 1, got {}", self.lookback_days);
        }
        if !(0.0..=1.0).contains(&self.min_correlation) {
            bail!(
                "min correlation must be within [0, 1], got {}",
                self.min_correlation
            );
        }
        if self.exit_z < 0.0 || self.exit_z >= self.entry_z {
            bail!(
                "exit z-score ({}) must be non-negative and below entry z-score ({})",
                self.exit_z,
                self.entry_z
            );
        }
        if !(self.take_profit_pct.is_finite() && self.stop_loss_pct.is_finite())
            || self.take_profit_pct <= 0.0
            || self.stop_loss_pct <= 0.0
        {
            bail!(
                "take profit ({}) and stop loss ({}) must be positive",
                self.take_profit_pct,
                self.stop_loss_pct
            );
        }
        if self.interval_secs == 0 {
            bail!("interval must be at least one second");
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                bail!("start date {} is after end date {}", start, end);
            }
        }
        Ok(())
    }

    /// Inclusive history window. Without an explicit end it ends at `today`;
    /// without an explicit start it reaches `lookback_days` back from the end.
    pub fn resolve_date_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.end_date.unwrap_or(today);
        let start = self
            .start_date
            .unwrap_or_else(|| end - Duration::days(self.lookback_days));
        (start, end)
    }

    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            entry_z: self.entry_z,
            exit_z: self.exit_z,
        }
    }

    pub fn risk_params(&self) -> RiskParams {
        RiskParams {
            take_profit_pct: self.take_profit_pct,
            stop_loss_pct: self.stop_loss_pct,
            limit_offset_bps: self.limit_offset_bps,
        }
    }
}
