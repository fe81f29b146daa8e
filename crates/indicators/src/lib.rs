//! # Indicators
//!
//! Advanced technical indicators over OHLCV series: the Stochastic Oscillator,
//! ADX with +DI/-DI, and Williams %R, together with their discrete signal
//! classifications.
//!
//! ## Architectural Principles
//!
//! - **Pure functions:** every indicator takes a bar slice and returns a new
//!   series. Nothing is cached between calls, so different symbols can be
//!   computed in parallel.
//! - **Explicit warm-up:** series are `Vec<Option<f64>>` aligned index-for-index
//!   with the input; positions before the warm-up period hold `None`.

pub mod adx;
pub mod error;
pub mod series;
pub mod signal;
pub mod stochastic;
pub mod suite;
pub mod williams_r;

pub use adx::{adx, trend_strength, AdxSeries, AdxTrend, TrendDirection, TrendStrength};
pub use error::IndicatorError;
pub use signal::Signal;
pub use stochastic::{stochastic, stochastic_signals, StochasticSeries};
pub use suite::{CompositeSignal, IndicatorSuite};
pub use williams_r::{williams_r, williams_r_signal, williams_r_signals};
