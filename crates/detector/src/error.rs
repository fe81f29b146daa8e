use configuration::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Detector parameters from configuration are invalid: {0}")]
    InvalidParameters(#[from] ConfigError),

    #[error("No monitoring session exists for symbol '{0}'.")]
    SessionNotFound(String),
}
