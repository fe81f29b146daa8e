use crate::error::DetectorError;
use crate::session::{MonitoringSession, SessionStore, WindowStats};
use chrono::{DateTime, Utc};
use configuration::FlashCrashConfig;
use core_types::Bar;
use events::{AlertAction, AlertEvent, AlertMetadata, AlertType, FlashCrashAlert};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Direction character of the closes in a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceTrend {
    ContinuousDrop,
    Volatile,
    Stable,
}

impl PriceTrend {
    /// Classifies a window from its share of falling bar-to-bar moves.
    pub fn from_moves(down_moves: usize, moves: usize) -> Self {
        if moves == 0 {
            return PriceTrend::Stable;
        }
        let down_ratio = Decimal::from(down_moves) / Decimal::from(moves);
        if down_ratio > dec!(0.7) {
            PriceTrend::ContinuousDrop
        } else if down_ratio >= dec!(0.4) && down_ratio <= dec!(0.6) {
            PriceTrend::Volatile
        } else {
            PriceTrend::Stable
        }
    }
}

/// The outcome of evaluating one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashCrashDetectionResult {
    pub symbol: String,
    /// True for the conditions that halt trading (flash crash or severe drop).
    pub is_flash_crash: bool,
    /// The condition the window qualifies for, whether or not an alert went out.
    pub classification: Option<AlertType>,
    /// The alert published for this evaluation, if any.
    pub alert: Option<FlashCrashAlert>,
    /// Set when the condition was already alerted on in this session.
    pub suppressed: bool,
    pub max_drop_percent: Decimal,
    pub volume_spike_ratio: Decimal,
    pub trend: PriceTrend,
    pub recommended_action: AlertAction,
    pub data_points: usize,
    /// Date of the latest bar in the window.
    pub evaluated_at: Option<DateTime<Utc>>,
}

/// Detects flash crashes over rolling bar windows and publishes alerts.
#[derive(Debug)]
pub struct FlashCrashDetector {
    config: FlashCrashConfig,
    sessions: SessionStore,
    alert_tx: broadcast::Sender<AlertEvent>,
}

impl FlashCrashDetector {
    /// Creates a new `FlashCrashDetector` with no monitoring sessions.
    pub fn new(config: FlashCrashConfig) -> Result<Self, DetectorError> {
        Self::with_store(config, SessionStore::new())
    }

    pub fn with_store(config: FlashCrashConfig, sessions: SessionStore) -> Result<Self, DetectorError> {
        config.validate()?;
        let (alert_tx, _) = broadcast::channel(config.alert_channel_capacity);
        Ok(Self {
            config,
            sessions,
            alert_tx,
        })
    }

    pub fn config(&self) -> &FlashCrashConfig {
        &self.config
    }

    /// Registers a new alert subscriber. Each receiver sees every event
    /// published after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.alert_tx.subscribe()
    }

    /// Evaluates a window of recent bars without touching any session.
    ///
    /// Every qualifying detection is published.
    pub fn detect(&self, symbol: &str, recent_bars: &[Bar]) -> FlashCrashDetectionResult {
        let stats = WindowStats::from_bars(recent_bars);
        let evaluated_at = recent_bars.last().map(|b| b.date);
        let mut result = self.evaluate(symbol, &stats, evaluated_at);

        if let (Some(alert_type), Some(at)) = (result.classification, evaluated_at) {
            let alert = self.build_alert(symbol, alert_type, &stats, at);
            self.publish_alert(&alert);
            result.alert = Some(alert);
        }
        result
    }

    /// Opens a monitoring session. Returns `false` if one already exists.
    pub fn start_monitoring(&mut self, symbol: &str, now: DateTime<Utc>) -> bool {
        if self.sessions.contains(symbol) {
            return false;
        }
        let capacity = self.config.buffer_capacity();
        self.sessions.insert(MonitoringSession::new(symbol, now, capacity));
        tracing::info!(symbol, capacity, "Flash crash monitoring started.");
        self.publish(AlertEvent::MonitoringStarted {
            symbol: symbol.to_string(),
            at: now,
        });
        true
    }

    /// Feeds a new bar into the symbol's session and evaluates the window.
    ///
    /// A session is opened on the first bar seen for a symbol. With
    /// `suppress_repeat_alerts`, a session only publishes a condition it has
    /// not already alerted on, or one more severe than the last alert; the
    /// session re-arms once the drop falls below the potential-crash threshold.
    pub fn add_data_point(&mut self, symbol: &str, bar: Bar) -> FlashCrashDetectionResult {
        if !self.sessions.contains(symbol) {
            self.start_monitoring(symbol, bar.date);
        }
        let at = bar.date;

        let stats = match self.sessions.get_mut(symbol) {
            Some(session) => {
                session.push(bar);
                session.stats()
            }
            None => WindowStats::from_bars(std::slice::from_ref(&bar)),
        };
        let mut result = self.evaluate(symbol, &stats, Some(at));

        let (should_emit, suppressed) = match self.sessions.get_mut(symbol) {
            Some(session) => match result.classification {
                Some(alert_type) => {
                    let escalates = session
                        .last_alert
                        .is_none_or(|last| alert_type.rank() > last.rank());
                    let emit = !self.config.suppress_repeat_alerts || escalates;
                    if emit {
                        session.alert_triggered = true;
                        session.last_alert = Some(alert_type);
                    }
                    (emit, !emit)
                }
                None => {
                    if result.max_drop_percent < self.config.potential_drop_percent {
                        session.alert_triggered = false;
                        session.last_alert = None;
                    }
                    (false, false)
                }
            },
            None => (result.classification.is_some(), false),
        };

        result.suppressed = suppressed;
        if should_emit {
            if let Some(alert_type) = result.classification {
                let alert = self.build_alert(symbol, alert_type, &stats, at);
                self.publish_alert(&alert);
                result.alert = Some(alert);
            }
        } else if suppressed {
            tracing::debug!(symbol, classification = ?result.classification, "Repeat alert suppressed.");
        }
        result
    }

    /// Closes a symbol's monitoring session. Returns whether one existed.
    pub fn stop_monitoring(&mut self, symbol: &str) -> bool {
        match self.sessions.remove(symbol) {
            Some(session) => {
                tracing::info!(symbol, bars = session.len(), "Flash crash monitoring stopped.");
                self.publish(AlertEvent::MonitoringStopped {
                    symbol: symbol.to_string(),
                    at: Utc::now(),
                });
                true
            }
            None => false,
        }
    }

    pub fn session(&self, symbol: &str) -> Result<&MonitoringSession, DetectorError> {
        self.sessions
            .get(symbol)
            .ok_or_else(|| DetectorError::SessionNotFound(symbol.to_string()))
    }

    pub fn monitored_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.sessions.symbols().map(str::to_string).collect();
        symbols.sort();
        symbols
    }

    /// Classifies a window, in priority order: severe drop, flash crash, potential crash.
    pub fn classify(&self, max_drop_percent: Decimal, volume_spike_ratio: Decimal) -> Option<AlertType> {
        let c = &self.config;
        if max_drop_percent >= c.severe_drop_percent {
            Some(AlertType::SevereDrop)
        } else if max_drop_percent >= c.price_drop_percent && volume_spike_ratio >= c.volume_threshold {
            Some(AlertType::FlashCrash)
        } else if max_drop_percent >= c.potential_drop_percent
            && volume_spike_ratio >= c.potential_volume_threshold
        {
            Some(AlertType::PotentialCrash)
        } else {
            None
        }
    }

    fn evaluate(
        &self,
        symbol: &str,
        stats: &WindowStats,
        evaluated_at: Option<DateTime<Utc>>,
    ) -> FlashCrashDetectionResult {
        if stats.data_points < self.config.min_data_points {
            return FlashCrashDetectionResult {
                symbol: symbol.to_string(),
                is_flash_crash: false,
                classification: None,
                alert: None,
                suppressed: false,
                max_drop_percent: Decimal::ZERO,
                volume_spike_ratio: Decimal::ZERO,
                trend: PriceTrend::Stable,
                recommended_action: AlertAction::Continue,
                data_points: stats.data_points,
                evaluated_at,
            };
        }

        let max_drop_percent = stats.max_drop_percent();
        let volume_spike_ratio = stats.volume_spike_ratio();
        let trend = PriceTrend::from_moves(stats.down_moves, stats.moves);
        let classification = self.classify(max_drop_percent, volume_spike_ratio);

        let recommended_action = match classification {
            Some(AlertType::SevereDrop | AlertType::FlashCrash) => AlertAction::HaltTrading,
            Some(AlertType::PotentialCrash) => AlertAction::ReduceExposure,
            None if trend == PriceTrend::ContinuousDrop => AlertAction::Monitor,
            None => AlertAction::Continue,
        };

        tracing::trace!(
            symbol,
            max_drop_percent = %max_drop_percent,
            volume_spike_ratio = %volume_spike_ratio,
            trend = ?trend,
            "Window evaluated."
        );

        FlashCrashDetectionResult {
            symbol: symbol.to_string(),
            is_flash_crash: matches!(
                classification,
                Some(AlertType::SevereDrop | AlertType::FlashCrash)
            ),
            classification,
            alert: None,
            suppressed: false,
            max_drop_percent,
            volume_spike_ratio,
            trend,
            recommended_action,
            data_points: stats.data_points,
            evaluated_at,
        }
    }

    fn build_alert(
        &self,
        symbol: &str,
        alert_type: AlertType,
        stats: &WindowStats,
        at: DateTime<Utc>,
    ) -> FlashCrashAlert {
        let metadata = AlertMetadata {
            volume_spike_ratio: stats.volume_spike_ratio(),
            average_volume: stats.average_volume(),
            current_volume: stats.latest_volume,
            highest_price: stats.highest,
            lowest_price: stats.lowest,
            data_points: stats.data_points,
        };
        FlashCrashAlert::new(symbol, alert_type, stats.max_drop_percent(), at, metadata)
    }

    fn publish_alert(&self, alert: &FlashCrashAlert) {
        tracing::warn!(
            symbol = %alert.symbol,
            alert_type = ?alert.alert_type,
            severity = ?alert.severity,
            drop_percent = %alert.drop_percent.round_dp(2),
            volume_spike_ratio = %alert.metadata.volume_spike_ratio.round_dp(2),
            action = ?alert.recommended_action,
            "Flash crash alert."
        );
        self.publish(AlertEvent::FlashCrash(alert.clone()));
    }

    fn publish(&self, event: AlertEvent) {
        // Sending only fails when nobody is subscribed.
        if self.alert_tx.send(event).is_err() {
            tracing::trace!("No alert subscribers; event dropped.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use events::AlertSeverity;
    use tokio::sync::broadcast::error::TryRecvError;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()
    }

    fn bar(minute: i64, open: Decimal, close: Decimal, volume: Decimal) -> Bar {
        Bar {
            date: start() + Duration::minutes(minute),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume,
        }
    }

    /// Five one-minute bars falling from 100 to 93 with the last volume at 3x the average.
    fn crash_bars() -> Vec<Bar> {
        vec![
            bar(0, dec!(100), dec!(99), dec!(1000)),
            bar(1, dec!(99), dec!(97.5), dec!(1000)),
            bar(2, dec!(97.5), dec!(96), dec!(1000)),
            bar(3, dec!(96), dec!(95), dec!(1000)),
            bar(4, dec!(95), dec!(93), dec!(6000)),
        ]
    }

    fn detector() -> FlashCrashDetector {
        FlashCrashDetector::new(FlashCrashConfig::default()).unwrap()
    }

    fn drain_alerts(rx: &mut broadcast::Receiver<AlertEvent>) -> Vec<FlashCrashAlert> {
        let mut alerts = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(AlertEvent::FlashCrash(alert)) => alerts.push(alert),
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        alerts
    }

    #[test]
    fn seven_percent_drop_with_volume_spike_is_a_flash_crash() {
        let d = detector();
        let mut rx = d.subscribe();
        let result = d.detect("BTCUSDT", &crash_bars());

        assert_eq!(result.max_drop_percent, dec!(7));
        assert_eq!(result.volume_spike_ratio, dec!(3));
        assert_eq!(result.classification, Some(AlertType::FlashCrash));
        assert!(result.is_flash_crash);
        assert_eq!(result.trend, PriceTrend::ContinuousDrop);
        assert_eq!(result.recommended_action, AlertAction::HaltTrading);

        let alert = result.alert.unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.recommended_action, AlertAction::HaltTrading);
        assert_eq!(alert.detected_at, start() + Duration::minutes(4));
        assert_eq!(alert.metadata.average_volume, dec!(2000));

        let published = drain_alerts(&mut rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, alert.id);
    }

    #[test]
    fn too_few_bars_is_stable_without_alert() {
        let bars = crash_bars();
        let result = detector().detect("BTCUSDT", &bars[3..]);
        assert_eq!(result.data_points, 2);
        assert_eq!(result.classification, None);
        assert_eq!(result.trend, PriceTrend::Stable);
        assert_eq!(result.recommended_action, AlertAction::Continue);

        let empty = detector().detect("BTCUSDT", &[]);
        assert!(empty.alert.is_none());
        assert!(empty.evaluated_at.is_none());
    }

    #[test]
    fn severe_drop_ignores_volume() {
        let bars = vec![
            bar(0, dec!(100), dec!(96), dec!(1000)),
            bar(1, dec!(96), dec!(92), dec!(1000)),
            bar(2, dec!(92), dec!(88), dec!(1000)),
        ];
        let result = detector().detect("ETHUSDT", &bars);
        assert_eq!(result.classification, Some(AlertType::SevereDrop));
        assert_eq!(result.alert.unwrap().severity, AlertSeverity::Critical);
    }

    #[test]
    fn moderate_drop_with_modest_volume_is_a_potential_crash() {
        let bars = vec![
            bar(0, dec!(100), dec!(99), dec!(1000)),
            bar(1, dec!(99), dec!(98), dec!(1000)),
            bar(2, dec!(98), dec!(97), dec!(1000)),
            bar(3, dec!(97), dec!(96), dec!(2000)),
        ];
        // drop 4%, spike 2000 / 1250 = 1.6
        let result = detector().detect("SOLUSDT", &bars);
        assert_eq!(result.classification, Some(AlertType::PotentialCrash));
        assert!(!result.is_flash_crash);
        assert_eq!(result.recommended_action, AlertAction::ReduceExposure);
    }

    #[test]
    fn large_drop_without_volume_is_not_a_flash_crash() {
        let mut bars = crash_bars();
        bars[4].volume = dec!(1000);
        let result = detector().detect("BTCUSDT", &bars);
        assert_eq!(result.classification, None);
        assert_eq!(result.recommended_action, AlertAction::Monitor);
    }

    #[test]
    fn alternating_closes_are_volatile() {
        assert_eq!(PriceTrend::from_moves(2, 4), PriceTrend::Volatile);
        assert_eq!(PriceTrend::from_moves(4, 4), PriceTrend::ContinuousDrop);
        assert_eq!(PriceTrend::from_moves(1, 4), PriceTrend::Stable);
        assert_eq!(PriceTrend::from_moves(13, 20), PriceTrend::Stable);
        assert_eq!(PriceTrend::from_moves(0, 0), PriceTrend::Stable);
    }

    #[test]
    fn monitoring_session_opens_on_first_bar() {
        let mut d = detector();
        let result = d.add_data_point("BTCUSDT", crash_bars()[0].clone());
        assert_eq!(result.data_points, 1);
        let session = d.session("BTCUSDT").unwrap();
        assert_eq!(session.started_at(), start());
        assert_eq!(session.capacity(), 300);
        assert_eq!(d.monitored_symbols(), vec!["BTCUSDT".to_string()]);
        assert!(!d.start_monitoring("BTCUSDT", start()));
    }

    #[test]
    fn streaming_matches_batch_detection() {
        let mut d = detector();
        let mut last = None;
        for b in crash_bars() {
            last = Some(d.add_data_point("BTCUSDT", b));
        }
        let streamed = last.unwrap();
        let batch = d.detect("BTCUSDT", &crash_bars());
        assert_eq!(streamed.max_drop_percent, batch.max_drop_percent);
        assert_eq!(streamed.volume_spike_ratio, batch.volume_spike_ratio);
        assert_eq!(streamed.trend, batch.trend);
        assert_eq!(streamed.classification, batch.classification);
        assert!(d.session("BTCUSDT").unwrap().alert_triggered());
    }

    #[test]
    fn repeated_conditions_are_suppressed_until_they_escalate() {
        let mut d = detector();
        let mut rx = d.subscribe();
        for b in crash_bars() {
            d.add_data_point("BTCUSDT", b);
        }
        // same crash condition persists with another heavy bar
        let repeat = d.add_data_point("BTCUSDT", bar(5, dec!(93), dec!(93), dec!(9000)));
        assert_eq!(repeat.classification, Some(AlertType::FlashCrash));
        assert!(repeat.suppressed);
        assert!(repeat.alert.is_none());

        // a deeper fall escalates to a severe drop
        let escalated = d.add_data_point("BTCUSDT", bar(6, dec!(93), dec!(89), dec!(1000)));
        assert_eq!(escalated.classification, Some(AlertType::SevereDrop));
        assert!(escalated.alert.is_some());

        let alerts = drain_alerts(&mut rx);
        let kinds: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(kinds, vec![AlertType::FlashCrash, AlertType::SevereDrop]);
    }

    #[test]
    fn session_rearms_once_the_crash_leaves_the_window() {
        // four one-minute bars per window
        let config = FlashCrashConfig {
            time_window_minutes: 1,
            check_interval_ms: 15_000,
            ..FlashCrashConfig::default()
        };
        let mut d = FlashCrashDetector::new(config).unwrap();
        let mut rx = d.subscribe();

        d.add_data_point("BTCUSDT", bar(0, dec!(100), dec!(100), dec!(1000)));
        d.add_data_point("BTCUSDT", bar(1, dec!(100), dec!(100), dec!(1000)));
        let first = d.add_data_point("BTCUSDT", bar(2, dec!(100), dec!(94), dec!(5000)));
        assert_eq!(first.classification, Some(AlertType::FlashCrash));
        assert!(first.alert.is_some());

        // calm bars while the 6% fall is still inside the window keep the session armed off
        for minute in 3..6 {
            let calm = d.add_data_point("BTCUSDT", bar(minute, dec!(94), dec!(94), dec!(1000)));
            assert_eq!(calm.max_drop_percent, dec!(6));
            assert_eq!(calm.classification, None);
        }
        assert!(d.session("BTCUSDT").unwrap().alert_triggered());

        // the crash bar is evicted and the drop falls back under 3%
        let settled = d.add_data_point("BTCUSDT", bar(6, dec!(94), dec!(94), dec!(1000)));
        assert_eq!(settled.max_drop_percent, Decimal::ZERO);
        let session = d.session("BTCUSDT").unwrap();
        assert_eq!(session.len(), 4);
        assert!(!session.alert_triggered());
        assert_eq!(session.last_alert(), None);

        // 94 -> 88.36 is another 6% fall, avg volume 2000, spike 2.5
        let second = d.add_data_point("BTCUSDT", bar(7, dec!(94), dec!(88.36), dec!(5000)));
        assert_eq!(second.classification, Some(AlertType::FlashCrash));
        assert!(!second.suppressed);
        assert!(second.alert.is_some());

        let kinds: Vec<AlertType> = drain_alerts(&mut rx).iter().map(|a| a.alert_type).collect();
        assert_eq!(kinds, vec![AlertType::FlashCrash, AlertType::FlashCrash]);
    }

    #[test]
    fn repeats_are_emitted_when_suppression_is_disabled() {
        let config = FlashCrashConfig {
            suppress_repeat_alerts: false,
            ..FlashCrashConfig::default()
        };
        let mut d = FlashCrashDetector::new(config).unwrap();
        let mut rx = d.subscribe();
        for b in crash_bars() {
            d.add_data_point("BTCUSDT", b);
        }
        d.add_data_point("BTCUSDT", bar(5, dec!(93), dec!(93), dec!(9000)));
        assert_eq!(drain_alerts(&mut rx).len(), 2);
    }

    #[test]
    fn stop_monitoring_discards_the_session() {
        let mut d = detector();
        let mut rx = d.subscribe();
        assert!(d.start_monitoring("ETHUSDT", start()));
        assert!(d.stop_monitoring("ETHUSDT"));
        assert!(!d.stop_monitoring("ETHUSDT"));
        assert!(matches!(d.session("ETHUSDT"), Err(DetectorError::SessionNotFound(_))));

        assert!(matches!(rx.try_recv(), Ok(AlertEvent::MonitoringStarted { .. })));
        assert!(matches!(rx.try_recv(), Ok(AlertEvent::MonitoringStopped { .. })));
    }

    #[test]
    fn symbols_do_not_share_state() {
        let mut d = detector();
        for b in crash_bars() {
            d.add_data_point("BTCUSDT", b);
        }
        let calm = d.add_data_point("ETHUSDT", bar(0, dec!(50), dec!(50), dec!(10)));
        assert_eq!(calm.data_points, 1);
        assert_eq!(d.session("BTCUSDT").unwrap().len(), 5);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = FlashCrashConfig {
            severe_drop_percent: dec!(1),
            ..FlashCrashConfig::default()
        };
        assert!(matches!(
            FlashCrashDetector::new(config),
            Err(DetectorError::InvalidParameters(_))
        ));
    }
}
