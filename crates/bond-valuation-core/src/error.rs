use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BondValuationError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid rate: {field} — {reason}")]
    InvalidRate { field: String, reason: String },

    #[error("Invalid cost percentage: {item} = {percentage}% (must be >= 0)")]
    InvalidCostPercentage { item: String, percentage: Decimal },

    #[error("Degenerate schedule: {0}")]
    DegenerateSchedule(String),

    #[error("Zero present value in {context}")]
    ZeroPresentValue { context: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Non-convergence: {function} did not converge after {iterations} iterations (last npv: {last_npv})")]
    NonConvergent {
        function: String,
        iterations: u32,
        last_npv: Decimal,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for BondValuationError {
    fn from(e: serde_json::Error) -> Self {
        BondValuationError::SerializationError(e.to_string())
    }
}
