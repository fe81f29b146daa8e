//! # Core Types
//!
//! The Layer 0 vocabulary shared by every analytics crate: OHLCV bars,
//! closed backtest trades and the aggregate backtest result.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{ExitReason, TradeSide};
pub use error::CoreError;
pub use structs::{validate_series, BacktestResult, BacktestTrade, Bar};
