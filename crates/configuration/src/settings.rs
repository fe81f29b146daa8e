use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The root configuration structure for the entire application.
///
/// Every section falls back to its defaults, so a partial `config.toml` only
/// needs to name the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gap_risk: GapRiskConfig,
    pub flash_crash: FlashCrashConfig,
    pub indicators: IndicatorConfig,
    pub backtest: BacktestMetricsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gap_risk.validate()?;
        self.flash_crash.validate()?;
        self.indicators.validate()?;
        self.backtest.validate()?;
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Parameters for overnight gap risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapRiskConfig {
    /// Gaps at or above this absolute percentage are CRITICAL.
    pub high_gap_percent: Decimal,
    /// Gaps at or above this absolute percentage are at least MEDIUM.
    pub medium_gap_percent: Decimal,
    /// The stop-loss distance, in percent of the open, before any gap adjustment.
    pub base_stop_percent: Decimal,
    /// Upper bound of the gap-proportional stop adjustment, in percent.
    pub max_gap_adjustment: Decimal,
    /// Fraction of the absolute gap added to the stop distance.
    pub gap_adjustment_factor: Decimal,
    /// Multiplier applied to the stop adjustment of downward gaps.
    pub downside_gap_multiplier: Decimal,
    /// Take-profit distance as a multiple of the stop distance.
    pub reward_risk_ratio: Decimal,
    /// Lower bound of the position-size adjustment factor.
    pub min_position_size: Decimal,
    /// Number of gap observations kept per symbol for statistics.
    pub lookback_period: usize,
}

impl Default for GapRiskConfig {
    fn default() -> Self {
        Self {
            high_gap_percent: dec!(5),
            medium_gap_percent: dec!(2),
            base_stop_percent: dec!(2),
            max_gap_adjustment: dec!(5),
            gap_adjustment_factor: dec!(0.5),
            downside_gap_multiplier: dec!(1.5),
            reward_risk_ratio: dec!(2),
            min_position_size: dec!(0.1),
            lookback_period: 252,
        }
    }
}

impl GapRiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.medium_gap_percent <= Decimal::ZERO {
            return Err(invalid("gap_risk.medium_gap_percent must be greater than 0"));
        }
        if self.high_gap_percent <= self.medium_gap_percent {
            return Err(invalid(
                "gap_risk.high_gap_percent must be greater than medium_gap_percent",
            ));
        }
        if self.base_stop_percent <= Decimal::ZERO || self.base_stop_percent >= dec!(100) {
            return Err(invalid("gap_risk.base_stop_percent must be between 0 and 100"));
        }
        if self.max_gap_adjustment.is_sign_negative() || self.gap_adjustment_factor.is_sign_negative() {
            return Err(invalid(
                "gap_risk.max_gap_adjustment and gap_adjustment_factor cannot be negative",
            ));
        }
        if self.downside_gap_multiplier <= Decimal::ZERO {
            return Err(invalid("gap_risk.downside_gap_multiplier must be greater than 0"));
        }
        if self.reward_risk_ratio <= Decimal::ZERO {
            return Err(invalid("gap_risk.reward_risk_ratio must be greater than 0"));
        }
        if self.min_position_size <= Decimal::ZERO || self.min_position_size > Decimal::ONE {
            return Err(invalid("gap_risk.min_position_size must be in (0, 1]"));
        }
        if self.lookback_period < 2 {
            return Err(invalid("gap_risk.lookback_period must be at least 2"));
        }
        Ok(())
    }
}

/// Parameters for the rolling-window flash crash detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashCrashConfig {
    /// Drop (in percent) that, together with a volume spike, is a flash crash.
    pub price_drop_percent: Decimal,
    /// Volume spike ratio that confirms a flash crash.
    pub volume_threshold: Decimal,
    /// Drop (in percent) that is severe regardless of volume.
    pub severe_drop_percent: Decimal,
    /// Drop (in percent) that, with a smaller volume spike, is a potential crash.
    pub potential_drop_percent: Decimal,
    /// Volume spike ratio that confirms a potential crash.
    pub potential_volume_threshold: Decimal,
    /// The span of market data a monitoring session keeps.
    pub time_window_minutes: u64,
    /// The expected spacing between data points.
    pub check_interval_ms: u64,
    /// Below this many bars, detection reports a stable market.
    pub min_data_points: usize,
    /// Suppress alerts a monitoring session has already emitted.
    pub suppress_repeat_alerts: bool,
    /// Buffered alerts per subscriber before the slowest one starts lagging.
    pub alert_channel_capacity: usize,
}

impl Default for FlashCrashConfig {
    fn default() -> Self {
        Self {
            price_drop_percent: dec!(5),
            volume_threshold: dec!(2),
            severe_drop_percent: dec!(10),
            potential_drop_percent: dec!(3),
            potential_volume_threshold: dec!(1.5),
            time_window_minutes: 5,
            check_interval_ms: 1000,
            min_data_points: 3,
            suppress_repeat_alerts: true,
            alert_channel_capacity: 64,
        }
    }
}

impl FlashCrashConfig {
    /// Number of bars a monitoring session retains.
    pub fn buffer_capacity(&self) -> usize {
        if self.check_interval_ms == 0 {
            return 1;
        }
        let capacity = self.time_window_minutes.saturating_mul(60_000) / self.check_interval_ms;
        (capacity as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.potential_drop_percent <= Decimal::ZERO {
            return Err(invalid("flash_crash.potential_drop_percent must be greater than 0"));
        }
        if self.price_drop_percent < self.potential_drop_percent
            || self.severe_drop_percent < self.price_drop_percent
        {
            return Err(invalid(
                "flash_crash drop thresholds must satisfy potential <= price <= severe",
            ));
        }
        if self.volume_threshold <= Decimal::ZERO || self.potential_volume_threshold <= Decimal::ZERO {
            return Err(invalid("flash_crash volume thresholds must be greater than 0"));
        }
        if self.time_window_minutes == 0 || self.check_interval_ms == 0 {
            return Err(invalid(
                "flash_crash.time_window_minutes and check_interval_ms must be greater than 0",
            ));
        }
        if self.min_data_points < 2 {
            return Err(invalid("flash_crash.min_data_points must be at least 2"));
        }
        if self.buffer_capacity() < self.min_data_points {
            return Err(invalid(format!(
                "flash_crash window holds {} bars, fewer than min_data_points ({})",
                self.buffer_capacity(),
                self.min_data_points
            )));
        }
        if self.alert_channel_capacity == 0 {
            return Err(invalid("flash_crash.alert_channel_capacity must be greater than 0"));
        }
        Ok(())
    }
}

/// Periods and signal bands for the advanced technical indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub stochastic_k_period: usize,
    pub stochastic_d_period: usize,
    pub stochastic_oversold: f64,
    pub stochastic_overbought: f64,
    pub adx_period: usize,
    pub williams_period: usize,
    pub williams_oversold: f64,
    pub williams_overbought: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            stochastic_k_period: 14,
            stochastic_d_period: 3,
            stochastic_oversold: 20.0,
            stochastic_overbought: 80.0,
            adx_period: 14,
            williams_period: 14,
            williams_oversold: -80.0,
            williams_overbought: -20.0,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stochastic_k_period == 0 || self.stochastic_d_period == 0 {
            return Err(invalid("indicators stochastic periods must be greater than 0"));
        }
        if self.adx_period == 0 || self.williams_period == 0 {
            return Err(invalid("indicators adx_period and williams_period must be greater than 0"));
        }
        if !(0.0..=100.0).contains(&self.stochastic_oversold)
            || !(0.0..=100.0).contains(&self.stochastic_overbought)
            || self.stochastic_oversold >= self.stochastic_overbought
        {
            return Err(invalid(
                "indicators stochastic bands must lie in [0, 100] with oversold < overbought",
            ));
        }
        if !(-100.0..=0.0).contains(&self.williams_oversold)
            || !(-100.0..=0.0).contains(&self.williams_overbought)
            || self.williams_oversold >= self.williams_overbought
        {
            return Err(invalid(
                "indicators williams bands must lie in [-100, 0] with oversold < overbought",
            ));
        }
        Ok(())
    }
}

/// Parameters for backtest performance metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestMetricsConfig {
    /// The value the reconstructed equity curve starts from.
    pub initial_equity: f64,
    /// Annual risk-free rate as a fraction (0.02 for 2%).
    pub risk_free_rate: f64,
    /// Periods used to annualize per-trade Sharpe and Sortino ratios.
    pub trading_days_per_year: f64,
    /// Number of equal-width bins in the return histogram.
    pub histogram_bins: usize,
    /// Return (in percent) separating gains from losses in the Omega ratio.
    pub omega_threshold: f64,
}

impl Default for BacktestMetricsConfig {
    fn default() -> Self {
        Self {
            initial_equity: 100.0,
            risk_free_rate: 0.0,
            trading_days_per_year: 252.0,
            histogram_bins: 10,
            omega_threshold: 0.0,
        }
    }
}

impl BacktestMetricsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_equity > 0.0) {
            return Err(invalid("backtest.initial_equity must be greater than 0"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(invalid("backtest.risk_free_rate must be a finite number"));
        }
        if !(self.trading_days_per_year > 0.0) {
            return Err(invalid("backtest.trading_days_per_year must be greater than 0"));
        }
        if self.histogram_bins == 0 {
            return Err(invalid("backtest.histogram_bins must be greater than 0"));
        }
        if !self.omega_threshold.is_finite() {
            return Err(invalid("backtest.omega_threshold must be a finite number"));
        }
        Ok(())
    }
}

/// Output layout of the console/file log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Settings for the `tracing` subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs go to a daily rolling file in this directory instead of stderr.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            directory: None,
            file_prefix: "riskdesk.log".to_string(),
        }
    }
}
