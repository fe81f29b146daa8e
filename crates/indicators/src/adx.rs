use crate::error::IndicatorError;
use crate::series::{ensure_period, to_hlc};
use core_types::Bar;
use serde::{Deserialize, Serialize};

/// Floor applied to the DX denominator.
const DX_DENOMINATOR_FLOOR: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStrength {
    None,
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    Down,
}

/// Trend reading at one index of an ADX series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdxTrend {
    pub adx: f64,
    pub strength: TrendStrength,
    /// Which directional indicator dominates. Absent when there is no trend.
    pub direction: Option<TrendDirection>,
}

/// ADX, +DI and -DI lines aligned with the input bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdxSeries {
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
}

impl AdxSeries {
    /// The trend reading at `ix`, once ADX and both DI lines are defined.
    pub fn trend_at(&self, ix: usize) -> Option<AdxTrend> {
        let adx = (*self.adx.get(ix)?)?;
        let plus = (*self.plus_di.get(ix)?)?;
        let minus = (*self.minus_di.get(ix)?)?;

        let strength = trend_strength(adx);
        let direction = match strength {
            TrendStrength::None => None,
            _ if plus > minus => Some(TrendDirection::Up),
            _ => Some(TrendDirection::Down),
        };
        Some(AdxTrend {
            adx,
            strength,
            direction,
        })
    }

    pub fn latest_trend(&self) -> Option<AdxTrend> {
        self.adx.len().checked_sub(1).and_then(|ix| self.trend_at(ix))
    }
}

/// Buckets an ADX value: Strong above 40, Moderate above 25, Weak above 20.
pub fn trend_strength(adx: f64) -> TrendStrength {
    if adx > 40.0 {
        TrendStrength::Strong
    } else if adx > 25.0 {
        TrendStrength::Moderate
    } else if adx > 20.0 {
        TrendStrength::Weak
    } else {
        TrendStrength::None
    }
}

/// Computes ADX with +DI/-DI using Wilder smoothing.
///
/// True Range and directional movement start at the second bar. The smoothed
/// TR/+DM/-DM are seeded with the plain sum of the first `period` values and
/// then follow `s[i] = s[i-1] - s[i-1] / period + v[i]`, so DI and DX are
/// defined from index `period`. ADX is seeded with the mean of the first
/// `period` DX values (index `2 * period - 1`) and then follows
/// `adx[i] = (adx[i-1] * (period - 1) + dx[i]) / period`.
pub fn adx(bars: &[Bar], period: usize) -> Result<AdxSeries, IndicatorError> {
    ensure_period("ADX", period)?;
    let hlc = to_hlc(bars)?;
    let len = hlc.len();
    let p = period as f64;

    let mut series = AdxSeries {
        adx: vec![None; len],
        plus_di: vec![None; len],
        minus_di: vec![None; len],
    };

    let mut smoothed_tr = 0.0;
    let mut smoothed_plus = 0.0;
    let mut smoothed_minus = 0.0;
    let mut dx_sum = 0.0;
    let mut dx_count = 0;
    let mut prev_adx: Option<f64> = None;

    for ix in 1..len {
        let (cur, prev) = (hlc[ix], hlc[ix - 1]);

        let tr = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        if ix <= period {
            smoothed_tr += tr;
            smoothed_plus += plus_dm;
            smoothed_minus += minus_dm;
            if ix < period {
                continue;
            }
        } else {
            smoothed_tr = smoothed_tr - smoothed_tr / p + tr;
            smoothed_plus = smoothed_plus - smoothed_plus / p + plus_dm;
            smoothed_minus = smoothed_minus - smoothed_minus / p + minus_dm;
        }

        let (plus_di, minus_di) = if smoothed_tr > 0.0 {
            (smoothed_plus / smoothed_tr * 100.0, smoothed_minus / smoothed_tr * 100.0)
        } else {
            (0.0, 0.0)
        };
        series.plus_di[ix] = Some(plus_di);
        series.minus_di[ix] = Some(minus_di);

        let dx = (plus_di - minus_di).abs() / (plus_di + minus_di).max(DX_DENOMINATOR_FLOOR) * 100.0;

        let adx_value = match prev_adx {
            Some(prev) => Some((prev * (p - 1.0) + dx) / p),
            None => {
                dx_sum += dx;
                dx_count += 1;
                (dx_count == period).then(|| dx_sum / p)
            }
        };
        if let Some(value) = adx_value {
            series.adx[ix] = Some(value);
            prev_adx = Some(value);
        }
    }

    Ok(series)
}
