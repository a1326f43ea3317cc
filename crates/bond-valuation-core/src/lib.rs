pub mod costs;
pub mod error;
pub mod rates;
pub mod risk;
pub mod schedule;
pub mod sensitivity;
pub mod terms;
pub mod time_value;
pub mod types;
pub mod valuation;

pub use error::BondValuationError;
pub use terms::BondTerms;
pub use types::*;
pub use valuation::{evaluate, evaluate_with, value_bond, ValuationReport};

/// Standard result type for all bond valuation operations
pub type BondValuationResult<T> = Result<T, BondValuationError>;
