pub mod aligner;
pub mod hedge;
pub mod position;
pub mod risk;
pub mod signal;
pub mod spread;

pub use aligner::{align, AlignedFrame, AlignedRow, PricePoint, PriceSeries};
pub use hedge::HedgeRatio;
pub use position::{
    IntentBatch, IntentKind, PairPositionEngine, PositionDirection, PositionState, Side,
    TradeIntent,
};
pub use risk::{OrderRequest, RiskOrderBuilder, RiskParams};
pub use signal::{Signal, SignalThresholds};
pub use spread::SpreadRow;
