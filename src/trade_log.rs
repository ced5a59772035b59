use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::ports::{TradeLogger, TradeRecord};

pub const DEFAULT_TRADE_LOG_FILE: &str = "trade_log.jsonl";

/// Appends one JSON object per submitted order.
#[derive(Debug)]
pub struct FileTradeLogger {
    path: PathBuf,
    // serialises appends from concurrent cycles
    write_lock: Mutex<()>,
}

impl FileTradeLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeLogger for FileTradeLogger {
    fn record(&self, record: &TradeRecord) -> std::io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "trade log lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        log::debug!("[TRADE_LOG] {}", line);
        Ok(())
    }
}
