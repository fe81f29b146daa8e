use crate::error::EventsError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The classification of a detected crash condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PotentialCrash,
    FlashCrash,
    SevereDrop,
}

impl AlertType {
    /// Ordering used when deciding whether a new alert escalates an earlier one.
    pub fn rank(&self) -> u8 {
        match self {
            AlertType::PotentialCrash => 1,
            AlertType::FlashCrash => 2,
            AlertType::SevereDrop => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

/// What a consumer of the alert is advised to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertAction {
    HaltTrading,
    ReduceExposure,
    Monitor,
    Continue,
}

/// Market context captured at detection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub volume_spike_ratio: Decimal,
    pub average_volume: Decimal,
    pub current_volume: Decimal,
    pub highest_price: Decimal,
    pub lowest_price: Decimal,
    pub data_points: usize,
}

/// An immutable record of one detected crash condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashCrashAlert {
    pub id: Uuid,
    pub symbol: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub drop_percent: Decimal,
    pub detected_at: DateTime<Utc>,
    pub recommended_action: AlertAction,
    pub metadata: AlertMetadata,
}

impl FlashCrashAlert {
    pub fn new(
        symbol: impl Into<String>,
        alert_type: AlertType,
        drop_percent: Decimal,
        detected_at: DateTime<Utc>,
        metadata: AlertMetadata,
    ) -> Self {
        let (severity, recommended_action) = match alert_type {
            AlertType::SevereDrop => (AlertSeverity::Critical, AlertAction::HaltTrading),
            AlertType::FlashCrash => (AlertSeverity::High, AlertAction::HaltTrading),
            AlertType::PotentialCrash => (AlertSeverity::Medium, AlertAction::ReduceExposure),
        };
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            alert_type,
            severity,
            drop_percent,
            detected_at,
            recommended_action,
            metadata,
        }
    }
}

/// The top-level message published on the alert channel.
///
/// Serialized with `#[serde(tag = "type", content = "payload")]`, so a crash
/// alert looks like `{ "type": "FlashCrash", "payload": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum AlertEvent {
    /// A newly detected crash condition.
    FlashCrash(FlashCrashAlert),
    /// A symbol's monitoring session was opened.
    MonitoringStarted { symbol: String, at: DateTime<Utc> },
    /// A symbol's monitoring session was closed by the caller.
    MonitoringStopped { symbol: String, at: DateTime<Utc> },
}

impl AlertEvent {
    pub fn symbol(&self) -> &str {
        match self {
            AlertEvent::FlashCrash(alert) => &alert.symbol,
            AlertEvent::MonitoringStarted { symbol, .. } => symbol,
            AlertEvent::MonitoringStopped { symbol, .. } => symbol,
        }
    }

    pub fn to_json(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string(self)?)
    }
}
