use crate::error::IndicatorError;
use core_types::Bar;
use rust_decimal::prelude::*;

/// The `f64` high/low/close of one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Hlc {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Converts bars to `f64` once, up front.
///
/// The `ta` building blocks use `f64`; this is a controlled and accepted
/// precision trade-off for indicator values.
pub(crate) fn to_hlc(bars: &[Bar]) -> Result<Vec<Hlc>, IndicatorError> {
    bars.iter()
        .map(|bar| {
            let convert = |value: Decimal, field: &str| {
                value.to_f64().ok_or_else(|| {
                    IndicatorError::Conversion(format!("{} {} at {}", field, value, bar.date))
                })
            };
            Ok(Hlc {
                high: convert(bar.high, "high")?,
                low: convert(bar.low, "low")?,
                close: convert(bar.close, "close")?,
            })
        })
        .collect()
}

pub(crate) fn ensure_period(name: &str, period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameters(format!(
            "{} period cannot be zero",
            name
        )));
    }
    Ok(())
}

pub(crate) fn ta_error(name: &str, err: ta::errors::TaError) -> IndicatorError {
    IndicatorError::InvalidParameters(format!("Failed to initialize {}: {:?}", name, err))
}
