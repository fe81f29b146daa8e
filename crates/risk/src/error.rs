use configuration::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Risk parameters from configuration are invalid: {0}")]
    InvalidParameters(#[from] ConfigError),
}
