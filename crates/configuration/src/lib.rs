//! # Configuration
//!
//! Strongly typed settings for every analytics module, plus the logging
//! bootstrap shared by binaries. Modules never load configuration themselves;
//! they are GIVEN a validated section by the caller.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{
    BacktestMetricsConfig, Config, FlashCrashConfig, GapRiskConfig, IndicatorConfig, LogFormat,
    LoggingConfig,
};

/// Loads the application configuration from the `config.toml` file.
///
/// The file is optional: missing sections and keys fall back to their defaults.
/// Any key can be overridden from the environment, e.g.
/// `RISKDESK_GAP_RISK__HIGH_GAP_PERCENT=6`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config.toml")
}

/// Loads and validates configuration from an explicit file path.
pub fn load_config_from(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("RISKDESK")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(path, "Configuration loaded.");
    Ok(config)
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When a log directory
/// is configured, output goes to a daily rolling file and the returned guard
/// must be held for the lifetime of the program to flush buffered lines.
pub fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let (writer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.directory.is_none())
        .with_writer(writer);

    let installed = match logging.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}
