//! # Events
//!
//! This crate defines the alert records emitted by the detection modules and
//! the envelope they travel in on the alert channel.
//!
//! As a Layer 0 crate, it has no workspace dependencies and provides the
//! definitive language for all alert consumers.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::{
    AlertAction, AlertEvent, AlertMetadata, AlertSeverity, AlertType, FlashCrashAlert,
};
