use configuration::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Indicator received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Indicator configuration is invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to convert bar value to f64: {0}")]
    Conversion(String),
}
