use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid {0}: {1}")]
    InvalidInput(String, String),

    /// Arithmetic left the representable range, e.g. compounded equity overflowing `Decimal`.
    #[error("Backtest arithmetic failed: {0}")]
    Calculation(String),
}
