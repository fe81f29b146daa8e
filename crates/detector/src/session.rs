use chrono::{DateTime, Utc};
use core_types::Bar;
use events::AlertType;
use moving_min_max::{MovingMax, MovingMin};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Aggregates of a bar window that detection decisions are made from.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub highest: Decimal,
    pub lowest: Decimal,
    pub total_volume: Decimal,
    pub latest_volume: Decimal,
    pub data_points: usize,
    /// Bar-to-bar close moves in the window.
    pub moves: usize,
    /// Of those, the moves where the close fell.
    pub down_moves: usize,
}

impl WindowStats {
    /// Scans a bar slice once. An empty slice yields all-zero stats.
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut stats = Self {
            highest: bars.first().map(|b| b.high).unwrap_or(Decimal::ZERO),
            lowest: bars.first().map(|b| b.low).unwrap_or(Decimal::ZERO),
            total_volume: Decimal::ZERO,
            latest_volume: bars.last().map(|b| b.volume).unwrap_or(Decimal::ZERO),
            data_points: bars.len(),
            moves: bars.len().saturating_sub(1),
            down_moves: 0,
        };
        for bar in bars {
            stats.highest = stats.highest.max(bar.high);
            stats.lowest = stats.lowest.min(bar.low);
            stats.total_volume += bar.volume;
        }
        stats.down_moves = bars.windows(2).filter(|w| w[1].close < w[0].close).count();
        stats
    }

    pub fn average_volume(&self) -> Decimal {
        if self.data_points == 0 {
            return Decimal::ZERO;
        }
        self.total_volume / Decimal::from(self.data_points)
    }

    /// Peak-to-trough span of the window as a percentage of the peak.
    pub fn max_drop_percent(&self) -> Decimal {
        if self.highest <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.highest - self.lowest) / self.highest * Decimal::ONE_HUNDRED
    }

    /// Latest volume relative to the window's average volume.
    pub fn volume_spike_ratio(&self) -> Decimal {
        let average = self.average_volume();
        if average <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.latest_volume / average
    }
}

/// The sliding window state of one monitored symbol.
///
/// Every update is amortized O(1): the extremes live in monotonic queues and
/// the volume and down-move counters are adjusted on append and eviction.
pub struct MonitoringSession {
    symbol: String,
    started_at: DateTime<Utc>,
    capacity: usize,
    bars: VecDeque<Bar>,
    highs: MovingMax<Decimal>,
    lows: MovingMin<Decimal>,
    total_volume: Decimal,
    down_moves: usize,
    pub(crate) alert_triggered: bool,
    pub(crate) last_alert: Option<AlertType>,
}

impl MonitoringSession {
    pub fn new(symbol: impl Into<String>, started_at: DateTime<Utc>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.into(),
            started_at,
            capacity,
            bars: VecDeque::with_capacity(capacity),
            highs: MovingMax::new(),
            lows: MovingMin::new(),
            total_volume: Decimal::ZERO,
            down_moves: 0,
            alert_triggered: false,
            last_alert: None,
        }
    }

    /// Appends a bar and evicts the oldest one once the window is full.
    pub fn push(&mut self, bar: Bar) {
        if let Some(last) = self.bars.back() {
            if bar.close < last.close {
                self.down_moves += 1;
            }
        }
        self.highs.push(bar.high);
        self.lows.push(bar.low);
        self.total_volume += bar.volume;
        self.bars.push_back(bar);

        if self.bars.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let Some(evicted) = self.bars.pop_front() else {
            return;
        };
        self.highs.pop();
        self.lows.pop();
        self.total_volume -= evicted.volume;
        if let Some(front) = self.bars.front() {
            if front.close < evicted.close {
                self.down_moves -= 1;
            }
        }
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            highest: self.highest_price().unwrap_or(Decimal::ZERO),
            lowest: self.lowest_price().unwrap_or(Decimal::ZERO),
            total_volume: self.total_volume,
            latest_volume: self.bars.back().map(|b| b.volume).unwrap_or(Decimal::ZERO),
            data_points: self.bars.len(),
            moves: self.bars.len().saturating_sub(1),
            down_moves: self.down_moves,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn highest_price(&self) -> Option<Decimal> {
        self.highs.max().copied()
    }

    pub fn lowest_price(&self) -> Option<Decimal> {
        self.lows.min().copied()
    }

    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    pub fn alert_triggered(&self) -> bool {
        self.alert_triggered
    }

    pub fn last_alert(&self) -> Option<AlertType> {
        self.last_alert
    }
}

impl fmt::Debug for MonitoringSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringSession")
            .field("symbol", &self.symbol)
            .field("started_at", &self.started_at)
            .field("capacity", &self.capacity)
            .field("len", &self.bars.len())
            .field("highest", &self.highest_price())
            .field("lowest", &self.lowest_price())
            .field("total_volume", &self.total_volume)
            .field("alert_triggered", &self.alert_triggered)
            .finish()
    }
}

/// Monitoring sessions keyed by symbol.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, MonitoringSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&MonitoringSession> {
        self.sessions.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut MonitoringSession> {
        self.sessions.get_mut(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.sessions.contains_key(symbol)
    }

    pub fn insert(&mut self, session: MonitoringSession) {
        self.sessions.insert(session.symbol.clone(), session);
    }

    pub fn remove(&mut self, symbol: &str) -> Option<MonitoringSession> {
        self.sessions.remove(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
