use crate::error::IndicatorError;
use crate::series::{ensure_period, ta_error, to_hlc};
use crate::signal::Signal;
use core_types::Bar;
use ta::indicators::{Maximum, Minimum};
use ta::Next;

/// Floor applied to the high-low range.
const RANGE_FLOOR: f64 = 0.0001;

/// Computes Williams %R: `(highest high - close) / (highest high - lowest low) * -100`.
///
/// Values lie in `[-100, 0]` and are defined from index `period - 1`.
pub fn williams_r(bars: &[Bar], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    ensure_period("Williams %R", period)?;
    let hlc = to_hlc(bars)?;

    let mut highest = Maximum::new(period).map_err(|e| ta_error("Maximum", e))?;
    let mut lowest = Minimum::new(period).map_err(|e| ta_error("Minimum", e))?;

    let values = hlc
        .iter()
        .enumerate()
        .map(|(ix, bar)| {
            let period_high = highest.next(bar.high);
            let period_low = lowest.next(bar.low);
            if ix + 1 < period {
                return None;
            }
            let range = (period_high - period_low).max(RANGE_FLOOR);
            Some(((period_high - bar.close) / range * -100.0).clamp(-100.0, 0.0))
        })
        .collect();

    Ok(values)
}

/// Buy at or below `oversold`, Sell at or above `overbought`.
pub fn williams_r_signal(value: f64, oversold: f64, overbought: f64) -> Signal {
    if value <= oversold {
        Signal::Buy
    } else if value >= overbought {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}

pub fn williams_r_signals(values: &[Option<f64>], oversold: f64, overbought: f64) -> Vec<Signal> {
    values
        .iter()
        .map(|v| v.map_or(Signal::Neutral, |v| williams_r_signal(v, oversold, overbought)))
        .collect()
}
