use crate::error::RiskError;
use crate::gap_history::{GapHistoryStore, GapStatistics};
use chrono::{DateTime, Utc};
use configuration::GapRiskConfig;
use core_types::Bar;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapDirection {
    Up,
    Down,
}

/// Risk classification of a gap. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapAction {
    Hold,
    ReduceSize,
    Close,
    Avoid,
}

/// The outcome of assessing one bar's opening gap.
///
/// Levels are expressed for a long holding: the stop sits below the open and
/// the target above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRiskAssessment {
    pub symbol: String,
    pub date: DateTime<Utc>,
    pub previous_close: Decimal,
    pub current_open: Decimal,
    pub gap_percent: Decimal,
    pub direction: GapDirection,
    pub risk_level: RiskLevel,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Stop distance as a percentage of the open.
    pub stop_distance_percent: Decimal,
    /// Factor in `[min_position_size, 1]` to scale the normal position by.
    pub position_size_adjustment: Decimal,
    pub recommended_action: GapAction,
    /// Distance of this gap from the symbol's historical mean, in standard deviations.
    pub z_score: Option<Decimal>,
}

/// Classifies opening gaps and keeps rolling per-symbol gap statistics.
#[derive(Debug, Clone)]
pub struct GapRiskAssessor {
    config: GapRiskConfig,
    store: GapHistoryStore,
}

impl GapRiskAssessor {
    /// Creates a new `GapRiskAssessor` with an empty history store.
    pub fn new(config: GapRiskConfig) -> Result<Self, RiskError> {
        Self::with_store(config, GapHistoryStore::new())
    }

    /// Creates an assessor over an existing store, e.g. one restored by the caller.
    pub fn with_store(config: GapRiskConfig, store: GapHistoryStore) -> Result<Self, RiskError> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &GapRiskConfig {
        &self.config
    }

    pub fn store(&self) -> &GapHistoryStore {
        &self.store
    }

    /// Percentage gap between the previous close and the current open.
    ///
    /// A zero or negative previous close yields a gap of 0.
    pub fn gap_percent(previous_close: Decimal, current_open: Decimal) -> Decimal {
        if previous_close <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (current_open - previous_close) / previous_close * Decimal::ONE_HUNDRED
    }

    /// Maps an absolute gap onto a risk level.
    pub fn risk_level(&self, gap_percent: Decimal) -> RiskLevel {
        let abs_gap = gap_percent.abs();
        if abs_gap >= self.config.high_gap_percent {
            RiskLevel::Critical
        } else if abs_gap >= self.high_band() {
            RiskLevel::High
        } else if abs_gap >= self.config.medium_gap_percent {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Discrete position-size schedule for a gap.
    pub fn position_size_adjustment(&self, gap_percent: Decimal) -> Decimal {
        let abs_gap = gap_percent.abs();
        let factor = if abs_gap >= self.config.high_gap_percent {
            dec!(0.25)
        } else if abs_gap >= self.high_band() {
            dec!(0.5)
        } else if abs_gap >= self.config.medium_gap_percent {
            dec!(0.75)
        } else {
            Decimal::ONE
        };
        factor.max(self.config.min_position_size)
    }

    /// Assesses the gap between `previous_close` and `current_bar.open`.
    ///
    /// When an ATR is supplied and it exceeds the base stop distance, the stop
    /// distance is kept between one ATR and `max_gap_adjustment` ATRs.
    pub fn assess_gap_risk(
        &self,
        symbol: &str,
        current_bar: &Bar,
        previous_close: Decimal,
        atr: Option<Decimal>,
    ) -> GapRiskAssessment {
        let open = current_bar.open;
        let gap_percent = Self::gap_percent(previous_close, open);
        let direction = if gap_percent.is_sign_negative() && !gap_percent.is_zero() {
            GapDirection::Down
        } else {
            GapDirection::Up
        };
        let abs_gap = gap_percent.abs();
        let risk_level = self.risk_level(gap_percent);

        // --- Adaptive stop distance ---
        let mut adjustment =
            (abs_gap * self.config.gap_adjustment_factor).min(self.config.max_gap_adjustment);
        if direction == GapDirection::Down {
            adjustment *= self.config.downside_gap_multiplier;
        }
        let stop_percent = self.config.base_stop_percent + adjustment;
        let mut stop_distance = open * stop_percent / Decimal::ONE_HUNDRED;

        if let Some(atr) = atr {
            let base_distance = open * self.config.base_stop_percent / Decimal::ONE_HUNDRED;
            if atr > Decimal::ZERO && atr > base_distance {
                let ceiling = (atr * self.config.max_gap_adjustment).max(atr);
                stop_distance = stop_distance.max(atr).min(ceiling);
            }
        }

        let stop_loss = (open - stop_distance).max(Decimal::ZERO);
        let take_profit = open + stop_distance * self.config.reward_risk_ratio;
        let stop_distance_percent = if open > Decimal::ZERO {
            stop_distance / open * Decimal::ONE_HUNDRED
        } else {
            stop_percent
        };

        let recommended_action = self.recommended_action(direction, abs_gap, risk_level);
        let z_score = self
            .store
            .statistics(symbol)
            .and_then(|stats| stats.z_score(gap_percent));

        if risk_level == RiskLevel::Critical {
            tracing::warn!(
                symbol,
                gap_percent = %gap_percent,
                action = ?recommended_action,
                "Critical opening gap detected."
            );
        } else {
            tracing::debug!(
                symbol,
                gap_percent = %gap_percent,
                risk_level = ?risk_level,
                stop_loss = %stop_loss,
                "Gap risk assessed."
            );
        }

        GapRiskAssessment {
            symbol: symbol.to_string(),
            date: current_bar.date,
            previous_close,
            current_open: open,
            gap_percent,
            direction,
            risk_level,
            stop_loss,
            take_profit,
            stop_distance_percent,
            position_size_adjustment: self.position_size_adjustment(gap_percent),
            recommended_action,
            z_score,
        }
    }

    /// Assesses a gap and then feeds it into the symbol's statistics.
    pub fn assess_and_record(
        &mut self,
        symbol: &str,
        current_bar: &Bar,
        previous_close: Decimal,
        atr: Option<Decimal>,
    ) -> GapRiskAssessment {
        let assessment = self.assess_gap_risk(symbol, current_bar, previous_close, atr);
        self.update_gap_statistics(symbol, assessment.gap_percent);
        assessment
    }

    /// Records a gap observation in the symbol's bounded history.
    ///
    /// Statistics are recomputed only once at least two observations exist.
    pub fn update_gap_statistics(&mut self, symbol: &str, gap_percent: Decimal) -> Option<&GapStatistics> {
        self.store.record(
            symbol,
            gap_percent,
            self.config.lookback_period,
            self.config.medium_gap_percent,
        )
    }

    /// Feeds every close-to-open gap of a historical series into the statistics.
    pub fn seed_from_history(&mut self, symbol: &str, bars: &[Bar]) -> Option<&GapStatistics> {
        for pair in bars.windows(2) {
            let gap = Self::gap_percent(pair[0].close, pair[1].open);
            self.store.record(
                symbol,
                gap,
                self.config.lookback_period,
                self.config.medium_gap_percent,
            );
        }
        tracing::debug!(symbol, bars = bars.len(), "Gap statistics seeded from history.");
        self.store.statistics(symbol)
    }

    pub fn gap_statistics(&self, symbol: &str) -> Option<&GapStatistics> {
        self.store.statistics(symbol)
    }

    pub fn clear_symbol(&mut self, symbol: &str) -> bool {
        self.store.remove(symbol)
    }

    fn high_band(&self) -> Decimal {
        self.config.high_gap_percent * dec!(0.75)
    }

    fn recommended_action(&self, direction: GapDirection, abs_gap: Decimal, level: RiskLevel) -> GapAction {
        let high = self.config.high_gap_percent;
        match (direction, level) {
            (GapDirection::Down, _) if abs_gap >= high => GapAction::Close,
            (GapDirection::Up, _) if abs_gap >= high => GapAction::Avoid,
            (_, RiskLevel::Critical) => GapAction::Close,
            (_, RiskLevel::High | RiskLevel::Medium) => GapAction::ReduceSize,
            (_, RiskLevel::Low) => GapAction::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_with_open(open: Decimal) -> Bar {
        Bar {
            date: Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap(),
            open,
            high: open + dec!(1),
            low: open - dec!(1),
            close: open,
            volume: dec!(10000),
        }
    }

    fn assessor() -> GapRiskAssessor {
        GapRiskAssessor::new(GapRiskConfig::default()).unwrap()
    }

    #[test]
    fn six_percent_gap_down_is_critical_and_closes() {
        let result = assessor().assess_gap_risk("AAPL", &bar_with_open(dec!(94)), dec!(100), None);
        assert_eq!(result.gap_percent, dec!(-6));
        assert_eq!(result.direction, GapDirection::Down);
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(result.recommended_action, GapAction::Close);
        assert_eq!(result.position_size_adjustment, dec!(0.25));
    }

    #[test]
    fn large_gap_up_is_avoided() {
        let result = assessor().assess_gap_risk("AAPL", &bar_with_open(dec!(106)), dec!(100), None);
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert_eq!(result.recommended_action, GapAction::Avoid);
    }

    #[test]
    fn zero_gap_is_up_and_held() {
        let result = assessor().assess_gap_risk("AAPL", &bar_with_open(dec!(100)), dec!(100), None);
        assert_eq!(result.gap_percent, Decimal::ZERO);
        assert_eq!(result.direction, GapDirection::Up);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.recommended_action, GapAction::Hold);
        assert_eq!(result.position_size_adjustment, Decimal::ONE);
        // base stop only: 2% of 100, target at 2:1
        assert_eq!(result.stop_loss, dec!(98));
        assert_eq!(result.take_profit, dec!(104));
    }

    #[test]
    fn zero_previous_close_yields_zero_gap() {
        let result = assessor().assess_gap_risk("AAPL", &bar_with_open(dec!(50)), Decimal::ZERO, None);
        assert_eq!(result.gap_percent, Decimal::ZERO);
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    #[test]
    fn downside_gaps_get_wider_stops() {
        let a = assessor();
        // 3% gaps: adjustment = 1.5, down gets 1.5 * 1.5 = 2.25
        let down = a.assess_gap_risk("X", &bar_with_open(dec!(97)), dec!(100), None);
        let up = a.assess_gap_risk("X", &bar_with_open(dec!(103)), dec!(100), None);
        assert_eq!(down.stop_distance_percent, dec!(4.25));
        assert_eq!(up.stop_distance_percent, dec!(3.5));
        assert_eq!(down.risk_level, RiskLevel::Medium);
        assert_eq!(down.recommended_action, GapAction::ReduceSize);
        assert_eq!(down.position_size_adjustment, dec!(0.75));
    }

    #[test]
    fn take_profit_is_twice_the_stop_distance() {
        let result = assessor().assess_gap_risk("X", &bar_with_open(dec!(103)), dec!(100), None);
        let stop_distance = result.current_open - result.stop_loss;
        let target_distance = result.take_profit - result.current_open;
        assert_eq!(target_distance, stop_distance * dec!(2));
    }

    #[test]
    fn atr_bounds_the_stop_distance() {
        let a = assessor();
        // base distance is 2.0; an ATR of 3 exceeds it, so the stop widens to one ATR
        let result = a.assess_gap_risk("X", &bar_with_open(dec!(100)), dec!(100), Some(dec!(3)));
        assert_eq!(result.stop_loss, dec!(97));
        assert_eq!(result.take_profit, dec!(106));

        // an ATR below the base distance leaves the stop alone
        let result = a.assess_gap_risk("X", &bar_with_open(dec!(100)), dec!(100), Some(dec!(1)));
        assert_eq!(result.stop_loss, dec!(98));
    }

    #[test]
    fn atr_ceiling_tightens_an_oversized_stop() {
        let config = GapRiskConfig {
            max_gap_adjustment: dec!(1.2),
            gap_adjustment_factor: dec!(10),
            ..GapRiskConfig::default()
        };
        let a = GapRiskAssessor::new(config).unwrap();
        // 4% down gap: adjustment capped at 1.2 then * 1.5 = 1.8, stop 3.8% of 96
        // ATR 2.5 > base distance 1.92, ceiling = 2.5 * 1.2 = 3.0
        let result = a.assess_gap_risk("X", &bar_with_open(dec!(96)), dec!(100), Some(dec!(2.5)));
        assert_eq!(result.current_open - result.stop_loss, dec!(3.0));
    }

    #[test]
    fn risk_level_is_monotonic_in_gap_size() {
        let a = assessor();
        let mut previous = RiskLevel::Low;
        for step in 0..=200 {
            let gap = Decimal::from(step) * dec!(0.05);
            let level = a.risk_level(gap);
            assert!(level >= previous, "gap {} classified below a smaller gap", gap);
            assert_eq!(level, a.risk_level(-gap));
            previous = level;
        }
        assert_eq!(a.risk_level(dec!(3.75)), RiskLevel::High);
        assert_eq!(a.risk_level(dec!(3.74)), RiskLevel::Medium);
    }

    #[test]
    fn position_size_never_drops_below_floor() {
        let config = GapRiskConfig {
            min_position_size: dec!(0.5),
            ..GapRiskConfig::default()
        };
        let a = GapRiskAssessor::new(config).unwrap();
        assert_eq!(a.position_size_adjustment(dec!(-12)), dec!(0.5));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GapRiskConfig {
            reward_risk_ratio: Decimal::ZERO,
            ..GapRiskConfig::default()
        };
        assert!(matches!(GapRiskAssessor::new(config), Err(RiskError::InvalidParameters(_))));
    }

    #[test]
    fn z_score_uses_recorded_statistics() {
        let mut a = assessor();
        assert!(a.update_gap_statistics("X", dec!(1)).is_none());
        a.update_gap_statistics("X", dec!(-1));
        // mean 0, std dev 1
        let result = a.assess_gap_risk("X", &bar_with_open(dec!(103)), dec!(100), None);
        let z = result.z_score.unwrap();
        assert!((z - dec!(3)).abs() < dec!(0.000001));
    }

    #[test]
    fn seeding_walks_consecutive_bars() {
        let mut a = assessor();
        let mut bars = Vec::new();
        for (day, (open, close)) in [(100, 101), (102, 100), (99, 99), (101, 100)].into_iter().enumerate() {
            bars.push(Bar {
                date: Utc.with_ymd_and_hms(2024, 1, day as u32 + 1, 0, 0, 0).unwrap(),
                open: Decimal::from(open),
                high: Decimal::from(open.max(close) + 1),
                low: Decimal::from(open.min(close) - 1),
                close: Decimal::from(close),
                volume: dec!(1000),
            });
        }
        let stats = a.seed_from_history("SPY", &bars).unwrap();
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.gap_down_count, 1);
        assert!(a.clear_symbol("SPY"));
        assert!(a.gap_statistics("SPY").is_none());
    }

    #[test]
    fn assess_and_record_updates_history() {
        let mut a = assessor();
        a.assess_and_record("X", &bar_with_open(dec!(101)), dec!(100), None);
        a.assess_and_record("X", &bar_with_open(dec!(99)), dec!(100), None);
        assert_eq!(a.store().history("X").map(|h| h.len()), Some(2));
        assert!(a.gap_statistics("X").is_some());
    }
}
