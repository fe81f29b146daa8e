use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Rolling aggregate of one symbol's historical gap percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapStatistics {
    pub symbol: String,
    pub sample_count: usize,
    pub avg_gap_percent: Decimal,
    /// Population standard deviation.
    pub std_dev_gap_percent: Decimal,
    pub max_gap_percent: Decimal,
    pub min_gap_percent: Decimal,
    pub gap_up_count: usize,
    pub gap_down_count: usize,
    /// Share of observations whose absolute gap reached the medium threshold.
    pub large_gap_frequency: Decimal,
}

impl GapStatistics {
    /// Computes statistics over a history. Returns `None` below two observations.
    pub fn compute(symbol: &str, history: &VecDeque<Decimal>, medium_gap_percent: Decimal) -> Option<Self> {
        if history.len() < 2 {
            return None;
        }

        let count = Decimal::from(history.len());
        let sum: Decimal = history.iter().sum();
        let mean = sum / count;

        let variance = history
            .iter()
            .map(|g| (*g - mean) * (*g - mean))
            .sum::<Decimal>()
            / count;
        // Variance is never negative, so `sqrt` only fails on overflow.
        let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);

        let max = history.iter().copied().max().unwrap_or(Decimal::ZERO);
        let min = history.iter().copied().min().unwrap_or(Decimal::ZERO);
        let gap_up_count = history.iter().filter(|g| !g.is_sign_negative()).count();
        let gap_down_count = history.len() - gap_up_count;
        let large = history.iter().filter(|g| g.abs() >= medium_gap_percent).count();

        Some(Self {
            symbol: symbol.to_string(),
            sample_count: history.len(),
            avg_gap_percent: mean,
            std_dev_gap_percent: std_dev,
            max_gap_percent: max,
            min_gap_percent: min,
            gap_up_count,
            gap_down_count,
            large_gap_frequency: Decimal::from(large) / count,
        })
    }

    /// How many standard deviations a gap lies from the historical mean.
    pub fn z_score(&self, gap_percent: Decimal) -> Option<Decimal> {
        if self.std_dev_gap_percent.is_zero() {
            return None;
        }
        Some((gap_percent - self.avg_gap_percent) / self.std_dev_gap_percent)
    }
}

/// Per-symbol gap history and the statistics derived from it.
///
/// Each symbol's state is independent; mutating one symbol never touches another.
#[derive(Debug, Clone, Default)]
pub struct GapHistoryStore {
    histories: HashMap<String, VecDeque<Decimal>>,
    statistics: HashMap<String, GapStatistics>,
}

impl GapHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a gap observation, evicting the oldest beyond `lookback`, and
    /// refreshes the symbol's statistics once two observations exist.
    pub fn record(
        &mut self,
        symbol: &str,
        gap_percent: Decimal,
        lookback: usize,
        medium_gap_percent: Decimal,
    ) -> Option<&GapStatistics> {
        let history = self.histories.entry(symbol.to_string()).or_default();
        history.push_back(gap_percent);
        while history.len() > lookback {
            history.pop_front();
        }

        if let Some(stats) = GapStatistics::compute(symbol, history, medium_gap_percent) {
            self.statistics.insert(symbol.to_string(), stats);
        }
        self.statistics.get(symbol)
    }

    pub fn statistics(&self, symbol: &str) -> Option<&GapStatistics> {
        self.statistics.get(symbol)
    }

    pub fn history(&self, symbol: &str) -> Option<&VecDeque<Decimal>> {
        self.histories.get(symbol)
    }

    /// Forgets everything recorded for a symbol. Returns whether anything was stored.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.statistics.remove(symbol);
        self.histories.remove(symbol).is_some()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn single_observation_produces_no_statistics() {
        let mut store = GapHistoryStore::new();
        assert!(store.record("AAPL", dec!(1.5), 252, dec!(2)).is_none());
        assert_eq!(store.history("AAPL").map(|h| h.len()), Some(1));
    }

    #[test]
    fn constant_gaps_have_zero_deviation() {
        let mut store = GapHistoryStore::new();
        for _ in 0..10 {
            store.record("AAPL", dec!(1.25), 252, dec!(2));
        }
        let stats = store.statistics("AAPL").unwrap();
        assert_eq!(stats.sample_count, 10);
        assert_eq!(stats.avg_gap_percent, dec!(1.25));
        assert_eq!(stats.std_dev_gap_percent, Decimal::ZERO);
        assert_eq!(stats.gap_up_count, 10);
        assert_eq!(stats.large_gap_frequency, Decimal::ZERO);
        assert!(stats.z_score(dec!(3)).is_none());
    }

    #[test]
    fn history_is_bounded_fifo() {
        let mut store = GapHistoryStore::new();
        for gap in [dec!(-4), dec!(1), dec!(2), dec!(3)] {
            store.record("MSFT", gap, 3, dec!(2));
        }
        let history: Vec<Decimal> = store.history("MSFT").unwrap().iter().copied().collect();
        assert_eq!(history, vec![dec!(1), dec!(2), dec!(3)]);

        let stats = store.statistics("MSFT").unwrap();
        assert_eq!(stats.min_gap_percent, dec!(1));
        assert_eq!(stats.max_gap_percent, dec!(3));
        assert_eq!(stats.avg_gap_percent, dec!(2));
        assert_eq!(stats.gap_down_count, 0);
    }

    #[test]
    fn statistics_track_direction_and_large_gaps() {
        let mut store = GapHistoryStore::new();
        for gap in [dec!(-3), dec!(3), dec!(1), dec!(-1)] {
            store.record("TSLA", gap, 252, dec!(2));
        }
        let stats = store.statistics("TSLA").unwrap();
        assert_eq!(stats.gap_up_count, 2);
        assert_eq!(stats.gap_down_count, 2);
        assert_eq!(stats.large_gap_frequency, dec!(0.5));
        assert_eq!(stats.avg_gap_percent, Decimal::ZERO);
        // population variance = (9 + 9 + 1 + 1) / 4 = 5
        let expected = dec!(5).sqrt().unwrap();
        assert!((stats.std_dev_gap_percent - expected).abs() < dec!(0.0000001));
    }

    #[test]
    fn symbols_are_independent() {
        let mut store = GapHistoryStore::new();
        store.record("A", dec!(1), 252, dec!(2));
        store.record("A", dec!(2), 252, dec!(2));
        store.record("B", dec!(5), 252, dec!(2));
        assert!(store.remove("A"));
        assert!(store.statistics("A").is_none());
        assert_eq!(store.history("B").map(|h| h.len()), Some(1));
        assert!(!store.remove("A"));
    }
}
