use configuration::ConfigError;
use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Analytics configuration is invalid: {0}")]
    InvalidParameters(#[from] ConfigError),

    #[error("Backtest data could not be processed: {0}")]
    Core(#[from] CoreError),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}
