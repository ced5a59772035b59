use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PairTradeError {
    /// Aligned frame is shorter than the rolling window.
    InsufficientData { rows: usize, required: usize },
    /// |correlation| fell below the gate.
    WeakCorrelation { correlation: f64, threshold: f64 },
    InvalidQuantity { symbol: String, quantity: i64 },
    DataFetch { symbol: String, reason: String },
    OrderSubmission { symbol: String, reason: String },
    Gateway(String),
    /// A setting that cannot be applied, e.g. an unrepresentable percentage.
    Config(String),
}

impl PairTradeError {
    pub fn data_fetch(symbol: &str, reason: impl fmt::Display) -> Self {
        PairTradeError::DataFetch {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn order_submission(symbol: &str, reason: impl fmt::Display) -> Self {
        PairTradeError::OrderSubmission {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors that end the current analysis cycle without any trading action.
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            PairTradeError::InsufficientData { .. } | PairTradeError::WeakCorrelation { .. }
        )
    }
}

impl fmt::Display for PairTradeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PairTradeError::InsufficientData { rows, required } => write!(
                f,
                "Insufficient data: {} aligned rows, need at least {}",
                rows, required
            ),
            PairTradeError::WeakCorrelation {
                correlation,
                threshold,
            } => write!(
                f,
                "Weak correlation: |{:.4}| < {:.2}",
                correlation, threshold
            ),
            PairTradeError::InvalidQuantity { symbol, quantity } => write!(
                f,
                "Invalid quantity for {}: {} (must be greater than zero)",
                symbol, quantity
            ),
            PairTradeError::DataFetch { symbol, reason } => {
                write!(f, "Data fetch error for {}: {}", symbol, reason)
            }
            PairTradeError::OrderSubmission { symbol, reason } => {
                write!(f, "Order submission error for {}: {}", symbol, reason)
            }
            PairTradeError::Gateway(e) => write!(f, "Gateway error: {}", e),
            PairTradeError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl Error for PairTradeError {}

impl From<std::io::Error> for PairTradeError {
    fn from(err: std::io::Error) -> PairTradeError {
        PairTradeError::Gateway(err.to_string())
    }
}

impl From<serde_json::Error> for PairTradeError {
    fn from(err: serde_json::Error) -> PairTradeError {
        PairTradeError::Gateway(err.to_string())
    }
}
