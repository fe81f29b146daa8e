use chrono::{DateTime, Utc};
use core_types::{BacktestTrade, CoreError};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Equity after a trade closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: DateTime<Utc>,
    pub equity: Decimal,
}

/// Compounds each trade's profit onto `initial_equity`.
///
/// The first point is stamped with the first trade's entry date, every other
/// point with the exit date of the trade that produced it. Fails when the
/// compounded equity leaves the `Decimal` range.
pub fn equity_curve(
    trades: &[BacktestTrade],
    initial_equity: Decimal,
) -> Result<Vec<EquityPoint>, CoreError> {
    let Some(first) = trades.first() else {
        return Ok(Vec::new());
    };

    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut equity = initial_equity;
    curve.push(EquityPoint {
        date: first.entry_date,
        equity,
    });
    for trade in trades {
        equity = trade.compound(equity)?;
        curve.push(EquityPoint {
            date: trade.exit_date,
            equity,
        });
    }
    Ok(curve)
}

/// One peak-to-recovery decline of the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownEpisode {
    pub peak_date: DateTime<Utc>,
    pub trough_date: DateTime<Utc>,
    /// Absent while the curve has not regained the peak.
    pub recovery_date: Option<DateTime<Utc>>,
    pub peak_equity: Decimal,
    pub trough_equity: Decimal,
    pub depth_pct: Decimal,
    /// Peak to recovery, or to the last point when unrecovered.
    pub duration_days: f64,
    /// Trough to recovery.
    pub recovery_days: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub worst_episode: Option<DrawdownEpisode>,
    pub episodes: Vec<DrawdownEpisode>,
    /// Mean drawdown depth (percent) over every point of the curve.
    pub pain_index: f64,
}

pub(crate) fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 86_400.0
}

/// Splits the curve into drawdown episodes using a running peak.
///
/// An episode opens when equity falls below the running peak and closes on
/// the first point at or above that peak.
pub fn analyze_drawdowns(curve: &[EquityPoint]) -> DrawdownAnalysis {
    let Some(&first) = curve.first() else {
        return DrawdownAnalysis::default();
    };

    let mut peak = first;
    let mut open: Option<DrawdownEpisode> = None;
    let mut episodes = Vec::new();
    let mut depth_sum = 0.0;

    for &point in &curve[1..] {
        if point.equity >= peak.equity {
            if let Some(mut episode) = open.take() {
                episode.recovery_date = Some(point.date);
                episode.recovery_days = Some(days_between(episode.trough_date, point.date));
                episode.duration_days = days_between(episode.peak_date, point.date);
                episodes.push(episode);
            }
            peak = point;
            continue;
        }

        let depth = if peak.equity > Decimal::ZERO {
            (peak.equity - point.equity) / peak.equity * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        depth_sum += depth.to_f64().unwrap_or(0.0);

        let episode = open.get_or_insert_with(|| DrawdownEpisode {
            peak_date: peak.date,
            trough_date: point.date,
            recovery_date: None,
            peak_equity: peak.equity,
            trough_equity: point.equity,
            depth_pct: depth,
            duration_days: 0.0,
            recovery_days: None,
        });
        if depth > episode.depth_pct {
            episode.depth_pct = depth;
            episode.trough_date = point.date;
            episode.trough_equity = point.equity;
        }
    }

    if let Some(mut episode) = open {
        if let Some(last) = curve.last() {
            episode.duration_days = days_between(episode.peak_date, last.date);
        }
        episodes.push(episode);
    }

    let worst_episode = episodes
        .iter()
        .fold(None::<&DrawdownEpisode>, |worst, e| match worst {
            Some(w) if w.depth_pct >= e.depth_pct => Some(w),
            _ => Some(e),
        })
        .cloned();

    DrawdownAnalysis {
        max_drawdown: worst_episode
            .as_ref()
            .map(|e| e.peak_equity - e.trough_equity)
            .unwrap_or(Decimal::ZERO),
        max_drawdown_pct: worst_episode
            .as_ref()
            .map(|e| e.depth_pct)
            .unwrap_or(Decimal::ZERO),
        worst_episode,
        episodes,
        pain_index: depth_sum / curve.len() as f64,
    }
}

/// Largest peak-to-trough decline of the curve, in percent of the peak.
pub fn max_drawdown_pct(curve: &[EquityPoint]) -> Decimal {
    let mut peak = match curve.first() {
        Some(p) => p.equity,
        None => return Decimal::ZERO,
    };
    let mut max = Decimal::ZERO;
    for point in curve {
        peak = peak.max(point.equity);
        if peak > Decimal::ZERO {
            max = max.max((peak - point.equity) / peak * Decimal::ONE_HUNDRED);
        }
    }
    max
}
