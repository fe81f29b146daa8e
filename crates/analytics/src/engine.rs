use crate::distribution::{mean, std_dev, ReturnDistribution};
use crate::drawdown::{analyze_drawdowns, days_between, equity_curve};
use crate::error::AnalyticsError;
use crate::report::{BenchmarkComparison, PerformanceReport};
use configuration::BacktestMetricsConfig;
use core_types::{BacktestResult, BacktestTrade};
use rust_decimal::prelude::*;

const DAYS_PER_YEAR: f64 = 365.0;

/// A stateless calculator for deriving performance metrics from a finished backtest.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    config: BacktestMetricsConfig,
    initial_equity: Decimal,
}

impl AnalyticsEngine {
    pub fn new(config: BacktestMetricsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let initial_equity = Decimal::from_f64(config.initial_equity).ok_or_else(|| {
            AnalyticsError::Calculation(format!(
                "initial equity {} is not representable as a decimal",
                config.initial_equity
            ))
        })?;
        Ok(Self {
            config,
            initial_equity,
        })
    }

    pub fn config(&self) -> &BacktestMetricsConfig {
        &self.config
    }

    /// The main entry point for calculating performance metrics.
    ///
    /// # Arguments
    ///
    /// * `result` - The finished backtest whose trades are analysed in order.
    /// * `benchmark` - Optional per-period benchmark returns in percent, aligned
    ///   with the trades.
    pub fn calculate(
        &self,
        result: &BacktestResult,
        benchmark: Option<&[f64]>,
    ) -> Result<PerformanceReport, AnalyticsError> {
        let mut report = PerformanceReport::new();
        let trades = &result.trades;

        if trades.is_empty() {
            // Nothing to measure: every metric stays zeroed or undefined.
            return Ok(report);
        }

        let returns = trades
            .iter()
            .map(|t| {
                t.profit_percent.to_f64().ok_or_else(|| {
                    AnalyticsError::Calculation(format!(
                        "profit percent {} is not representable as f64",
                        t.profit_percent
                    ))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        self.calculate_profitability(trades, &returns, &mut report);
        self.calculate_streaks(trades, &mut report);
        self.calculate_time_metrics(trades, &mut report);
        self.calculate_curve(trades, &mut report)?;
        report.distribution = ReturnDistribution::from_returns(&returns, self.config.histogram_bins);
        self.calculate_ratios(&returns, &mut report);
        report.benchmark = benchmark.and_then(|b| compare_benchmark(&returns, b));

        tracing::debug!(
            symbol = %result.symbol,
            trades = report.total_trades,
            total_return_pct = %report.total_return_pct,
            max_drawdown_pct = %report.drawdown.max_drawdown_pct,
            sharpe = ?report.sharpe_ratio,
            "Calculated performance report"
        );

        Ok(report)
    }

    /// Win/loss counts, averages, extremes and expectancy.
    fn calculate_profitability(
        &self,
        trades: &[BacktestTrade],
        returns: &[f64],
        report: &mut PerformanceReport,
    ) {
        report.total_trades = trades.len();

        let mut gross_win = 0.0;
        let mut gross_loss = 0.0;
        for (trade, &r) in trades.iter().zip(returns) {
            if trade.is_win() {
                report.winning_trades += 1;
                gross_win += r;
                report.largest_win_pct = report.largest_win_pct.max(r);
            } else {
                report.losing_trades += 1;
                gross_loss += -r;
                report.largest_loss_pct = report.largest_loss_pct.min(r);
            }
        }

        let total = report.total_trades as f64;
        let win_rate = report.winning_trades as f64 / total;
        report.win_rate_pct = win_rate * 100.0;

        if report.winning_trades > 0 {
            report.average_win_pct = gross_win / report.winning_trades as f64;
        }
        if report.losing_trades > 0 {
            report.average_loss_pct = gross_loss / report.losing_trades as f64;
        }
        if gross_loss > 0.0 {
            report.profit_factor = Some(gross_win / gross_loss);
        }
        if report.average_loss_pct > 0.0 {
            report.payoff_ratio = Some(report.average_win_pct / report.average_loss_pct);
        }

        report.expectancy_pct =
            win_rate * report.average_win_pct - (1.0 - win_rate) * report.average_loss_pct;
    }

    fn calculate_streaks(&self, trades: &[BacktestTrade], report: &mut PerformanceReport) {
        let (mut wins, mut losses) = (0, 0);
        for trade in trades {
            if trade.is_win() {
                wins += 1;
                losses = 0;
            } else {
                losses += 1;
                wins = 0;
            }
            report.max_consecutive_wins = report.max_consecutive_wins.max(wins);
            report.max_consecutive_losses = report.max_consecutive_losses.max(losses);
        }
    }

    fn calculate_time_metrics(&self, trades: &[BacktestTrade], report: &mut PerformanceReport) {
        let average = |filter: fn(&BacktestTrade) -> bool| {
            let days: Vec<f64> = trades.iter().filter(|t| filter(t)).map(|t| t.holding_days()).collect();
            mean(&days)
        };
        report.average_holding_days = average(|_| true);
        report.average_winning_holding_days = average(|t| t.is_win());
        report.average_losing_holding_days = average(|t| !t.is_win());
    }

    /// Equity curve, drawdowns and the compounded and annualized returns.
    fn calculate_curve(
        &self,
        trades: &[BacktestTrade],
        report: &mut PerformanceReport,
    ) -> Result<(), AnalyticsError> {
        let curve = equity_curve(trades, self.initial_equity)?;
        report.drawdown = analyze_drawdowns(&curve);

        if let (Some(first), Some(last)) = (curve.first(), curve.last()) {
            report.final_equity = last.equity;
            report.total_return_pct = (last.equity / self.initial_equity - Decimal::ONE)
                .checked_mul(Decimal::ONE_HUNDRED)
                .ok_or_else(|| {
                    AnalyticsError::Calculation(format!(
                        "total return of equity {} is out of range",
                        last.equity
                    ))
                })?;

            let span_days = days_between(first.date, last.date);
            let growth = (last.equity / self.initial_equity).to_f64().unwrap_or(0.0);
            report.annualized_return_pct = if span_days <= 0.0 {
                None
            } else if growth <= 0.0 {
                Some(-100.0)
            } else {
                Some((growth.powf(DAYS_PER_YEAR / span_days) - 1.0) * 100.0)
            };
        }
        report.equity_curve = curve;
        Ok(())
    }

    /// Sharpe, Sortino, Calmar, Omega and Pain ratios.
    fn calculate_ratios(&self, returns: &[f64], report: &mut PerformanceReport) {
        let periods = self.config.trading_days_per_year;
        let risk_free = self.config.risk_free_rate * 100.0 / periods;
        let mean_return = mean(returns);
        let excess = mean_return - risk_free;

        if returns.len() >= 2 {
            let sd = std_dev(returns);
            if sd > 0.0 {
                report.sharpe_ratio = Some(excess / sd * periods.sqrt());
            }

            let downside = (returns
                .iter()
                .map(|r| (r - risk_free).min(0.0).powi(2))
                .sum::<f64>()
                / returns.len() as f64)
                .sqrt();
            if downside > 0.0 {
                report.sortino_ratio = Some(excess / downside * periods.sqrt());
            }
        }

        let max_dd = report.drawdown.max_drawdown_pct.to_f64().unwrap_or(0.0);
        if let Some(annualized) = report.annualized_return_pct {
            if max_dd > 0.0 {
                report.calmar_ratio = Some(annualized / max_dd);
            }
            if report.drawdown.pain_index > 0.0 {
                report.pain_ratio = Some(annualized / report.drawdown.pain_index);
            }
        }

        let threshold = self.config.omega_threshold;
        let gains: f64 = returns.iter().map(|r| (r - threshold).max(0.0)).sum();
        let losses: f64 = returns.iter().map(|r| (threshold - r).max(0.0)).sum();
        if losses > 0.0 {
            report.omega_ratio = Some(gains / losses);
        }
    }
}

/// Pairs strategy and benchmark returns index by index, truncating to the shorter series.
fn compare_benchmark(returns: &[f64], benchmark: &[f64]) -> Option<BenchmarkComparison> {
    let periods = returns.len().min(benchmark.len());
    if periods < 2 {
        return None;
    }
    let (r, b) = (&returns[..periods], &benchmark[..periods]);
    let excess: Vec<f64> = r.iter().zip(b).map(|(r, b)| r - b).collect();

    let (mean_r, mean_b) = (mean(r), mean(b));
    let covariance =
        r.iter().zip(b).map(|(r, b)| (r - mean_r) * (b - mean_b)).sum::<f64>() / periods as f64;
    let (sd_r, sd_b) = (std_dev(r), std_dev(b));
    let sd_excess = std_dev(&excess);

    Some(BenchmarkComparison {
        periods,
        alpha: mean(&excess),
        beta: (sd_b > 0.0).then(|| covariance / (sd_b * sd_b)),
        correlation: (sd_r > 0.0 && sd_b > 0.0).then(|| covariance / (sd_r * sd_b)),
        information_ratio: (sd_excess > 0.0).then(|| mean(&excess) / sd_excess),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_types::{ExitReason, TradeSide};
    use rust_decimal_macros::dec;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn trade(entry: i64, exit: i64, profit: Decimal) -> BacktestTrade {
        BacktestTrade {
            entry_date: day(entry),
            exit_date: day(exit),
            entry_price: dec!(100),
            exit_price: dec!(100) + profit,
            side: TradeSide::Long,
            profit_percent: profit,
            exit_reason: if profit > Decimal::ZERO {
                ExitReason::TakeProfit
            } else {
                ExitReason::StopLoss
            },
        }
    }

    fn daily(profits: &[Decimal]) -> BacktestResult {
        let trades = profits
            .iter()
            .enumerate()
            .map(|(ix, &p)| trade(ix as i64, ix as i64 + 1, p))
            .collect();
        BacktestResult::from_trades("TEST", trades).unwrap()
    }

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(BacktestMetricsConfig::default()).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_backtest_gives_default_report() {
        let report = engine().calculate(&daily(&[]), None).unwrap();
        assert_eq!(report, PerformanceReport::default());
    }

    #[test]
    fn no_losing_trades_means_no_drawdown() {
        let report = engine()
            .calculate(&daily(&[dec!(2), dec!(1.5), dec!(3), dec!(0.5)]), None)
            .unwrap();
        assert_eq!(report.drawdown.max_drawdown, Decimal::ZERO);
        assert_eq!(report.drawdown.max_drawdown_pct, Decimal::ZERO);
        assert!(report.drawdown.episodes.is_empty());
        assert_eq!(report.losing_trades, 0);
        assert_eq!(report.profit_factor, None);
        assert_eq!(report.omega_ratio, None);
        assert_eq!(report.sortino_ratio, None);
        assert_eq!(report.calmar_ratio, None);
        assert_eq!(report.pain_ratio, None);
        assert!(report.sharpe_ratio.is_some());
    }

    #[test]
    fn alternating_trades_match_hand_computation() {
        let report = engine()
            .calculate(&daily(&[dec!(10), dec!(-5), dec!(10), dec!(-5)]), None)
            .unwrap();

        assert_eq!(report.total_trades, 4);
        assert!(close(report.win_rate_pct, 50.0));
        assert_eq!(report.profit_factor, Some(2.0));
        assert!(close(report.average_win_pct, 10.0));
        assert!(close(report.average_loss_pct, 5.0));
        assert_eq!(report.payoff_ratio, Some(2.0));
        assert!(close(report.expectancy_pct, 2.5));
        assert_eq!(report.largest_win_pct, 10.0);
        assert_eq!(report.largest_loss_pct, -5.0);
        assert_eq!(report.max_consecutive_wins, 1);
        assert_eq!(report.max_consecutive_losses, 1);
        assert!(close(report.average_holding_days, 1.0));

        // 100 -> 110 -> 104.5 -> 114.95 -> 109.2025
        assert_eq!(report.final_equity, dec!(109.2025));
        assert_eq!(report.total_return_pct, dec!(9.2025));
        assert_eq!(report.equity_curve.len(), 5);
        assert_eq!(report.drawdown.episodes.len(), 2);
        assert_eq!(report.drawdown.max_drawdown_pct, dec!(5));
        assert_eq!(report.drawdown.max_drawdown, dec!(5.5));
        assert!(report.drawdown.episodes[1].recovery_date.is_none());

        // mean 2.5, population std 7.5
        assert!(close(report.sharpe_ratio.unwrap(), 252f64.sqrt() / 3.0));
        assert!(close(report.sortino_ratio.unwrap(), 2.5 / 12.5f64.sqrt() * 252f64.sqrt()));
        assert_eq!(report.omega_ratio, Some(2.0));
        assert!(report.calmar_ratio.is_some());
        assert!(report.pain_ratio.is_some());
        assert_eq!(report.distribution.count, 4);
        assert!(close(report.distribution.median, 2.5));
    }

    #[test]
    fn streaks_track_the_longest_runs() {
        let report = engine()
            .calculate(
                &daily(&[dec!(1), dec!(2), dec!(-1), dec!(-1), dec!(0), dec!(3)]),
                None,
            )
            .unwrap();
        assert_eq!(report.max_consecutive_wins, 2);
        // a flat trade is not a win
        assert_eq!(report.max_consecutive_losses, 3);
        assert_eq!(report.largest_loss_pct, -1.0);
    }

    #[test]
    fn holding_periods_split_by_outcome() {
        let result = BacktestResult::from_trades(
            "TEST",
            vec![
                trade(0, 2, dec!(4)),
                trade(2, 6, dec!(2)),
                trade(6, 16, dec!(-3)),
            ],
        )
        .unwrap();
        let report = engine().calculate(&result, None).unwrap();
        assert!(close(report.average_holding_days, 16.0 / 3.0));
        assert!(close(report.average_winning_holding_days, 3.0));
        assert!(close(report.average_losing_holding_days, 10.0));
    }

    #[test]
    fn overflowing_equity_is_reported_not_panicked() {
        let trades: Vec<_> = (0..700).map(|ix| trade(ix, ix + 1, dec!(10))).collect();
        let result = BacktestResult {
            symbol: "TEST".to_string(),
            total_trades: trades.len(),
            winning_trades: trades.len(),
            losing_trades: 0,
            win_rate_pct: dec!(100),
            total_return_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            trades,
        };
        let err = engine().calculate(&result, None).unwrap_err();
        assert!(matches!(err, AnalyticsError::Core(_)));
    }

    #[test]
    fn one_year_span_annualizes_to_the_total_return() {
        let result = BacktestResult::from_trades("TEST", vec![trade(0, 365, dec!(10))]).unwrap();
        let report = engine().calculate(&result, None).unwrap();
        assert!((report.annualized_return_pct.unwrap() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn drawdown_matches_the_backtest_summary() {
        let mut state: u64 = 7;
        for _ in 0..20 {
            let profits: Vec<_> = (0..30)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    Decimal::new(((state >> 40) % 2000) as i64 - 900, 2)
                })
                .collect();
            let result = daily(&profits);
            let report = engine().calculate(&result, None).unwrap();
            let diff = (report.drawdown.max_drawdown_pct - result.max_drawdown_pct).abs();
            assert!(diff < dec!(0.000001), "diff {}", diff);
        }
    }

    #[test]
    fn benchmark_comparison_measures_co_movement() {
        let result = daily(&[dec!(1), dec!(-2), dec!(3), dec!(0.5)]);

        let same = [1.0, -2.0, 3.0, 0.5];
        let cmp = engine().calculate(&result, Some(&same[..])).unwrap().benchmark.unwrap();
        assert_eq!(cmp.periods, 4);
        assert!(close(cmp.alpha, 0.0));
        assert!(close(cmp.beta.unwrap(), 1.0));
        assert!(close(cmp.correlation.unwrap(), 1.0));
        assert_eq!(cmp.information_ratio, None);

        let doubled = [2.0, -4.0, 6.0, 1.0, 9.0];
        let cmp = engine().calculate(&result, Some(&doubled[..])).unwrap().benchmark.unwrap();
        assert_eq!(cmp.periods, 4);
        assert!(close(cmp.beta.unwrap(), 0.5));
        assert!(close(cmp.correlation.unwrap(), 1.0));
        assert!(cmp.alpha < 0.0);

        let short = engine().calculate(&result, Some(&[1.0][..])).unwrap();
        assert!(short.benchmark.is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = BacktestMetricsConfig {
            histogram_bins: 0,
            ..BacktestMetricsConfig::default()
        };
        assert!(matches!(
            AnalyticsEngine::new(config),
            Err(AnalyticsError::InvalidParameters(_))
        ));
    }
}
