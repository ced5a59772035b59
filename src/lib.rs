// src/lib.rs
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod rate_limit_notifier;
pub mod strategy;
pub mod trade {
    pub mod execution {
        pub mod gateway_box;
    }
}
pub mod trade_log;

pub use error::PairTradeError;
