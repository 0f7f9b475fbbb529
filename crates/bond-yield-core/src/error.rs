use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BondYieldError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("No convergence: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    NoConvergence {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for BondYieldError {
    fn from(e: serde_json::Error) -> Self {
        BondYieldError::SerializationError(e.to_string())
    }
}
