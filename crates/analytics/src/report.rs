use crate::distribution::ReturnDistribution;
use crate::drawdown::{DrawdownAnalysis, EquityPoint};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Strategy returns measured against a benchmark return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    /// Number of aligned return pairs used.
    pub periods: usize,
    /// Mean excess return per period, in percent.
    pub alpha: f64,
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
    pub information_ratio: Option<f64>,
}

/// A comprehensive, standardized report of a backtest's performance.
///
/// Returns and trade-level figures are in percent. Ratios that cannot be
/// defined for the given trades (zero deviation, no losses, no drawdown) are
/// `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // I. Core Profitability Metrics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    pub final_equity: Decimal,
    pub total_return_pct: Decimal,
    pub annualized_return_pct: Option<f64>,
    pub profit_factor: Option<f64>,
    pub expectancy_pct: f64,

    // II. Risk-Adjusted Ratios
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub omega_ratio: Option<f64>,
    pub pain_ratio: Option<f64>,

    // III. Trade-Level Statistics
    pub average_win_pct: f64,
    /// Magnitude of the average losing trade.
    pub average_loss_pct: f64,
    pub payoff_ratio: Option<f64>,
    pub largest_win_pct: f64,
    pub largest_loss_pct: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,

    // IV. Time-Based Metrics
    pub average_holding_days: f64,
    pub average_winning_holding_days: f64,
    pub average_losing_holding_days: f64,

    // V. Curve Analysis
    pub drawdown: DrawdownAnalysis,
    pub distribution: ReturnDistribution,
    pub benchmark: Option<BenchmarkComparison>,
    pub equity_curve: Vec<EquityPoint>,
}

impl PerformanceReport {
    /// Creates a new, zeroed-out PerformanceReport.
    pub fn new() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: 0.0,
            final_equity: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            annualized_return_pct: None,
            profit_factor: None,
            expectancy_pct: 0.0,
            sharpe_ratio: None,
            sortino_ratio: None,
            calmar_ratio: None,
            omega_ratio: None,
            pain_ratio: None,
            average_win_pct: 0.0,
            average_loss_pct: 0.0,
            payoff_ratio: None,
            largest_win_pct: 0.0,
            largest_loss_pct: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            average_holding_days: 0.0,
            average_winning_holding_days: 0.0,
            average_losing_holding_days: 0.0,
            drawdown: DrawdownAnalysis::default(),
            distribution: ReturnDistribution::default(),
            benchmark: None,
            equity_curve: Vec::new(),
        }
    }
}

impl Default for PerformanceReport {
    fn default() -> Self {
        Self::new()
    }
}
