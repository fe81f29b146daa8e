//! # Risk
//!
//! Overnight gap risk assessment.
//!
//! `GapRiskAssessor` classifies the gap between one session's close and the
//! next session's open, derives adaptive stop-loss/take-profit levels and a
//! position-size reduction, and keeps rolling per-symbol gap statistics in an
//! injected `GapHistoryStore`.

pub mod error;
pub mod gap_assessor;
pub mod gap_history;

pub use error::RiskError;
pub use gap_assessor::{GapAction, GapDirection, GapRiskAssessment, GapRiskAssessor, RiskLevel};
pub use gap_history::{GapHistoryStore, GapStatistics};
