use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Shape of the per-trade return distribution, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnDistribution {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Undefined for a zero-variance sample.
    pub skewness: Option<f64>,
    /// Excess kurtosis; undefined for a zero-variance sample.
    pub kurtosis: Option<f64>,
    pub percentiles: Percentiles,
    pub histogram: Vec<HistogramBin>,
}

impl ReturnDistribution {
    pub fn from_returns(returns: &[f64], bins: usize) -> Self {
        if returns.is_empty() {
            return Self::default();
        }

        let n = returns.len() as f64;
        let mean = mean(returns);
        let std_dev = std_dev(returns);

        let (skewness, kurtosis) = if std_dev > 0.0 {
            let m3 = returns.iter().map(|r| (r - mean).powi(3)).sum::<f64>() / n;
            let m4 = returns.iter().map(|r| (r - mean).powi(4)).sum::<f64>() / n;
            (Some(m3 / std_dev.powi(3)), Some(m4 / std_dev.powi(4) - 3.0))
        } else {
            (None, None)
        };

        let mut sorted = returns.to_vec();
        sorted.sort_by(f64::total_cmp);
        let percentiles = Percentiles {
            p5: percentile(&sorted, 5.0),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
        };

        Self {
            count: returns.len(),
            mean,
            median: percentiles.p50,
            std_dev,
            skewness,
            kurtosis,
            percentiles,
            histogram: histogram(&sorted, bins),
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linearly interpolated percentile of an ascending slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
        }
    }
}

/// Equal-width bins spanning min..=max. A zero-width range collapses into one bin.
fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: sorted.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<_> = (0..bins)
        .map(|ix| HistogramBin {
            lower: min + width * ix as f64,
            upper: if ix + 1 == bins { max } else { min + width * (ix + 1) as f64 },
            count: 0,
        })
        .collect();
    for value in sorted {
        let ix = (((value - min) / width).floor() as usize).min(bins - 1);
        histogram[ix].count += 1;
    }
    histogram
}
