use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use crate::error::PairTradeError;
use crate::ports::MarketDataProvider;
use crate::strategy::aligner::{PricePoint, PriceSeries};

// One line of the price dump: {"timestamp": <ms>, "prices": {"SYM": {"price": ..}}}
#[derive(Debug, Clone, Deserialize)]
struct DumpedSymbolSnapshot {
    price: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct DumpedDataEntry {
    timestamp: i64,
    prices: HashMap<String, DumpedSymbolSnapshot>,
}

#[derive(Debug, Default)]
struct Loaded {
    modified: Option<SystemTime>,
    data: Vec<DumpedDataEntry>,
}

/// Market data served from a JSONL price dump.
///
/// The file is re-read whenever its modification time changes, so a recorder
/// appending to it is picked up on the next cycle.
#[derive(Debug)]
pub struct ReplayFeed {
    path: PathBuf,
    loaded: RwLock<Loaded>,
}

fn read_entries(path: &Path) -> Result<Vec<DumpedDataEntry>, PairTradeError> {
    let file = File::open(path)
        .map_err(|e| PairTradeError::Gateway(format!("failed to open replay file: {}", e)))?;
    let reader = BufReader::new(file);
    let mut data = Vec::new();

    for line in reader.lines() {
        let line = line
            .map_err(|e| PairTradeError::Gateway(format!("failed to read replay line: {}", e)))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: DumpedDataEntry = serde_json::from_str(&line).map_err(|e| {
            PairTradeError::Gateway(format!("failed to parse replay entry '{}': {}", line, e))
        })?;
        data.push(entry);
    }

    if data.is_empty() {
        return Err(PairTradeError::Gateway(format!(
            "price dump {} is empty",
            path.display()
        )));
    }
    data.sort_by_key(|e| e.timestamp);
    Ok(data)
}

fn entry_time(entry: &DumpedDataEntry) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(entry.timestamp).single()
}

impl ReplayFeed {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PairTradeError> {
        let feed = Self {
            path: path.into(),
            loaded: RwLock::new(Loaded::default()),
        };
        feed.refresh()?;
        Ok(feed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self) -> Result<(), PairTradeError> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        {
            let loaded = self
                .loaded
                .read()
                .map_err(|_| PairTradeError::Gateway("replay feed lock poisoned".to_string()))?;
            if !loaded.data.is_empty() && modified.is_some() && loaded.modified == modified {
                return Ok(());
            }
        }
        let data = read_entries(&self.path)?;
        log::debug!(
            "[REPLAY] loaded {} samples from {}",
            data.len(),
            self.path.display()
        );
        let mut loaded = self
            .loaded
            .write()
            .map_err(|_| PairTradeError::Gateway("replay feed lock poisoned".to_string()))?;
        *loaded = Loaded { modified, data };
        Ok(())
    }

    fn with_data<T>(&self, f: impl FnOnce(&[DumpedDataEntry]) -> T) -> Result<T, PairTradeError> {
        self.refresh()?;
        let loaded = self
            .loaded
            .read()
            .map_err(|_| PairTradeError::Gateway("replay feed lock poisoned".to_string()))?;
        Ok(f(&loaded.data))
    }
}

#[async_trait]
impl MarketDataProvider for ReplayFeed {
    /// The close of a UTC day is its last sample; each close is stamped at
    /// midnight so both legs of a pair share timestamps.
    async fn get_daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PairTradeError> {
        let closes = self
            .with_data(|data| {
                let mut closes: BTreeMap<NaiveDate, f64> = BTreeMap::new();
                for entry in data {
                    let Some(snapshot) = entry.prices.get(symbol) else {
                        continue;
                    };
                    let Some(ts) = entry_time(entry) else {
                        continue;
                    };
                    let day = ts.date_naive();
                    if day < start || day > end || !snapshot.price.is_finite() {
                        continue;
                    }
                    closes.insert(day, snapshot.price);
                }
                closes
            })
            .map_err(|e| PairTradeError::data_fetch(symbol, e))?;

        if closes.is_empty() {
            return Err(PairTradeError::data_fetch(
                symbol,
                format!("no samples between {} and {}", start, end),
            ));
        }
        let points = closes
            .into_iter()
            .filter_map(|(day, price)| {
                day.and_hms_opt(0, 0, 0).map(|midnight| PricePoint {
                    ts: Utc.from_utc_datetime(&midnight),
                    price,
                })
            })
            .collect();
        Ok(PriceSeries::new(symbol, points))
    }

    async fn get_latest_price(&self, symbol: &str) -> Result<f64, PairTradeError> {
        let latest = self
            .with_data(|data| {
                data.iter()
                    .rev()
                    .find_map(|entry| entry.prices.get(symbol).map(|s| s.price))
            })
            .map_err(|e| PairTradeError::data_fetch(symbol, e))?;
        latest.ok_or_else(|| PairTradeError::data_fetch(symbol, "symbol not found in price dump"))
    }
}
