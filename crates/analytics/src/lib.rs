//! # Analytics Engine
//!
//! Quantitative analysis of finished backtests. It acts as the "unbiased judge"
//! of a strategy: drawdowns, the shape of the return distribution, and
//! risk-adjusted ratios.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends only on `core-types` and `configuration` (Layer 0).
//! - **Stateless Calculation:** The `AnalyticsEngine` is a stateless calculator. It takes
//!   a `BacktestResult` as input and produces a `PerformanceReport` as output.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `PerformanceReport`: The standardized struct that holds every performance metric.
//! - `analyze_drawdowns` / `equity_curve`: The curve reconstruction and episode scan.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

pub mod distribution;
pub mod drawdown;
pub mod engine;
pub mod error;
pub mod report;

pub use distribution::{HistogramBin, Percentiles, ReturnDistribution};
pub use drawdown::{analyze_drawdowns, equity_curve, max_drawdown_pct, DrawdownAnalysis, DrawdownEpisode, EquityPoint};
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::{BenchmarkComparison, PerformanceReport};
