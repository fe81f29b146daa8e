use crate::enums::{ExitReason, TradeSide};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV bar of market data.
///
/// Bars are immutable once recorded. A series for one symbol is ordered by
/// `date` ascending and never contains the same `date` twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// The high-low span of the bar.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// Checks that a bar series is strictly ascending by date.
///
/// The analytics crates tolerate degenerate inputs, so this is only used at the
/// boundary where external data enters the system.
pub fn validate_series(bars: &[Bar]) -> Result<(), CoreError> {
    for (ix, pair) in bars.windows(2).enumerate() {
        if pair[1].date == pair[0].date {
            return Err(CoreError::InvalidInput(
                "bar series".to_string(),
                format!("duplicate date {} at index {}", pair[1].date, ix + 1),
            ));
        }
        if pair[1].date < pair[0].date {
            return Err(CoreError::InvalidInput(
                "bar series".to_string(),
                format!("date {} at index {} is out of order", pair[1].date, ix + 1),
            ));
        }
    }
    Ok(())
}

/// A completed, simulated trade as produced by a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub entry_date: DateTime<Utc>,
    pub exit_date: DateTime<Utc>,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub side: TradeSide,
    /// Realized return of the trade in percent (e.g. 2.5 for +2.5%).
    pub profit_percent: Decimal,
    pub exit_reason: ExitReason,
}

impl BacktestTrade {
    pub fn is_win(&self) -> bool {
        self.profit_percent > Decimal::ZERO
    }

    /// Holding period in fractional days.
    pub fn holding_days(&self) -> f64 {
        (self.exit_date - self.entry_date).num_seconds() as f64 / 86_400.0
    }

    /// Applies this trade's return to `equity`.
    ///
    /// Fails instead of panicking when the compounded value leaves the
    /// `Decimal` range.
    pub fn compound(&self, equity: Decimal) -> Result<Decimal, CoreError> {
        Decimal::ONE
            .checked_add(self.profit_percent / Decimal::ONE_HUNDRED)
            .and_then(|growth| equity.checked_mul(growth))
            .ok_or_else(|| {
                CoreError::Calculation(format!(
                    "compounding {}% onto equity {} overflows",
                    self.profit_percent, equity
                ))
            })
    }
}

/// The aggregate outcome of a finished backtest.
///
/// Built once from an immutable trade list; the summary counters are never
/// partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub trades: Vec<BacktestTrade>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    /// Compounded return of the whole trade list, in percent.
    pub total_return_pct: Decimal,
    /// Deepest peak-to-trough decline of the compounded equity, in percent.
    pub max_drawdown_pct: Decimal,
}

impl BacktestResult {
    /// Summarises `trades`, compounding them from an equity of 100.
    pub fn from_trades(symbol: impl Into<String>, trades: Vec<BacktestTrade>) -> Result<Self, CoreError> {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_win()).count();
        let losing_trades = total_trades - winning_trades;

        let win_rate_pct = if total_trades > 0 {
            Decimal::from(winning_trades) / Decimal::from(total_trades) * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let mut equity = Decimal::ONE_HUNDRED;
        let mut peak = equity;
        let mut max_drawdown_pct = Decimal::ZERO;
        for trade in &trades {
            equity = trade.compound(equity)?;
            if equity > peak {
                peak = equity;
            }
            if peak > Decimal::ZERO {
                let drawdown = (peak - equity) / peak * Decimal::ONE_HUNDRED;
                max_drawdown_pct = max_drawdown_pct.max(drawdown);
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            total_trades,
            winning_trades,
            losing_trades,
            win_rate_pct,
            total_return_pct: equity - Decimal::ONE_HUNDRED,
            max_drawdown_pct,
            trades,
        })
    }
}
