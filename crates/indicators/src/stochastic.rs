use crate::error::IndicatorError;
use crate::series::{ensure_period, ta_error, to_hlc};
use crate::signal::Signal;
use core_types::Bar;
use serde::{Deserialize, Serialize};
use ta::indicators::{Maximum, Minimum, SimpleMovingAverage as Sma};
use ta::Next;

/// %K and %D lines of the Stochastic Oscillator, aligned with the input bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

impl StochasticSeries {
    pub fn latest(&self) -> (Option<f64>, Option<f64>) {
        (
            self.k.last().copied().flatten(),
            self.d.last().copied().flatten(),
        )
    }
}

/// Computes the Stochastic Oscillator.
///
/// `%K = (close - lowest low) / (highest high - lowest low) * 100` over
/// `k_period` bars, 50 when the range is zero. `%D` is the simple moving
/// average of `%K` over `d_period` values. `%K` is first defined at index
/// `k_period - 1`, `%D` at `k_period + d_period - 2`.
pub fn stochastic(
    bars: &[Bar],
    k_period: usize,
    d_period: usize,
) -> Result<StochasticSeries, IndicatorError> {
    ensure_period("Stochastic %K", k_period)?;
    ensure_period("Stochastic %D", d_period)?;
    let hlc = to_hlc(bars)?;

    let mut highest = Maximum::new(k_period).map_err(|e| ta_error("Maximum", e))?;
    let mut lowest = Minimum::new(k_period).map_err(|e| ta_error("Minimum", e))?;
    let mut d_sma = Sma::new(d_period).map_err(|e| ta_error("SMA", e))?;

    let mut k = vec![None; hlc.len()];
    let mut d = vec![None; hlc.len()];
    let mut k_count = 0;

    for (ix, bar) in hlc.iter().enumerate() {
        let period_high = highest.next(bar.high);
        let period_low = lowest.next(bar.low);
        if ix + 1 < k_period {
            continue;
        }

        let range = period_high - period_low;
        let k_value = if range == 0.0 {
            50.0
        } else {
            ((bar.close - period_low) / range * 100.0).clamp(0.0, 100.0)
        };
        k[ix] = Some(k_value);

        // The SMA only ever sees defined %K values.
        let d_value = d_sma.next(k_value);
        k_count += 1;
        if k_count >= d_period {
            d[ix] = Some(d_value);
        }
    }

    Ok(StochasticSeries { k, d })
}

/// Classifies each index of a Stochastic series.
///
/// Buy when %K crosses above %D with both below `oversold`; Sell when %K
/// crosses below %D with both above `overbought`; Neutral otherwise, including
/// every index where the previous values are still warming up.
pub fn stochastic_signals(series: &StochasticSeries, oversold: f64, overbought: f64) -> Vec<Signal> {
    let mut signals = vec![Signal::Neutral; series.k.len()];
    for ix in 1..series.k.len() {
        let (Some(prev_k), Some(prev_d), Some(k), Some(d)) =
            (series.k[ix - 1], series.d[ix - 1], series.k[ix], series.d[ix])
        else {
            continue;
        };

        let crossed_up = prev_k <= prev_d && k > d;
        let crossed_down = prev_k >= prev_d && k < d;

        signals[ix] = if crossed_up && k < oversold && d < oversold {
            Signal::Buy
        } else if crossed_down && k > overbought && d > overbought {
            Signal::Sell
        } else {
            Signal::Neutral
        };
    }
    signals
}
