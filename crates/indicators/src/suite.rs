use crate::adx::{adx, AdxSeries, AdxTrend, TrendDirection, TrendStrength};
use crate::error::IndicatorError;
use crate::signal::Signal;
use crate::stochastic::{stochastic, stochastic_signals, StochasticSeries};
use crate::williams_r::{williams_r, williams_r_signals};
use configuration::IndicatorConfig;
use core_types::Bar;
use serde::{Deserialize, Serialize};

/// Latest readings of all three indicators folded into one view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub stochastic: Signal,
    pub williams: Signal,
    pub trend: Option<AdxTrend>,
    /// Buy or Sell once at least two of the three inputs agree.
    pub consensus: Signal,
}

impl CompositeSignal {
    /// ADX votes with its dominant direction only when some trend is present.
    pub fn new(stochastic: Signal, williams: Signal, trend: Option<AdxTrend>) -> Self {
        let trend_vote = trend
            .filter(|t| t.strength != TrendStrength::None)
            .and_then(|t| t.direction)
            .map(|direction| match direction {
                TrendDirection::Up => Signal::Buy,
                TrendDirection::Down => Signal::Sell,
            })
            .unwrap_or(Signal::Neutral);

        let votes = [stochastic, williams, trend_vote];
        let buys = votes.iter().filter(|s| **s == Signal::Buy).count();
        let sells = votes.iter().filter(|s| **s == Signal::Sell).count();

        let consensus = if buys >= 2 {
            Signal::Buy
        } else if sells >= 2 {
            Signal::Sell
        } else {
            Signal::Neutral
        };

        Self {
            stochastic,
            williams,
            trend,
            consensus,
        }
    }
}

/// Every indicator for one bar series, computed with one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSuite {
    pub stochastic: StochasticSeries,
    pub stochastic_signals: Vec<Signal>,
    pub adx: AdxSeries,
    pub williams_r: Vec<Option<f64>>,
    pub williams_signals: Vec<Signal>,
    pub composite: CompositeSignal,
}

impl IndicatorSuite {
    pub fn compute(bars: &[Bar], config: &IndicatorConfig) -> Result<Self, IndicatorError> {
        config.validate()?;

        let stoch = stochastic(bars, config.stochastic_k_period, config.stochastic_d_period)?;
        let stoch_signals =
            stochastic_signals(&stoch, config.stochastic_oversold, config.stochastic_overbought);
        let adx_series = adx(bars, config.adx_period)?;
        let williams = williams_r(bars, config.williams_period)?;
        let williams_signals =
            williams_r_signals(&williams, config.williams_oversold, config.williams_overbought);

        let composite = CompositeSignal::new(
            stoch_signals.last().copied().unwrap_or_default(),
            williams_signals.last().copied().unwrap_or_default(),
            adx_series.latest_trend(),
        );

        tracing::debug!(
            bars = bars.len(),
            stochastic = ?composite.stochastic,
            williams = ?composite.williams,
            trend = ?composite.trend.map(|t| t.strength),
            consensus = ?composite.consensus,
            "Computed indicator suite"
        );

        Ok(Self {
            stochastic: stoch,
            stochastic_signals: stoch_signals,
            adx: adx_series,
            williams_r: williams,
            williams_signals,
            composite,
        })
    }
}
