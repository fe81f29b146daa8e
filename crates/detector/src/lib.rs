//! # Detector
//!
//! Rolling-window flash crash detection.
//!
//! ## Public API
//!
//! - `FlashCrashDetector`: stateless `detect` over a bar window, and stateful
//!   per-symbol monitoring (`start_monitoring`, `add_data_point`,
//!   `stop_monitoring`).
//! - `MonitoringSession` / `SessionStore`: the bounded per-symbol window state.
//! - Alerts are published as `events::AlertEvent` on a broadcast channel; call
//!   `FlashCrashDetector::subscribe` to receive them.

pub mod error;
pub mod flash_crash;
pub mod session;

pub use error::DetectorError;
pub use flash_crash::{FlashCrashDetectionResult, FlashCrashDetector, PriceTrend};
pub use session::{MonitoringSession, SessionStore, WindowStats};
