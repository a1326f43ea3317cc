use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%).
pub type Rate = Decimal;

/// Rates quoted as percentages (5 = 5%), the way bond terms are written.
pub type Percent = Decimal;

/// Year fractions
pub type Years = Decimal;

/// Explicit rounding context threaded through every evaluation.
///
/// `scale` bounds the fractional digits kept for rates and schedule amounts
/// while computing; `display_scale` is only applied when a report is rounded
/// for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precision {
    pub scale: u32,
    pub display_scale: u32,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            scale: 12,
            display_scale: 2,
        }
    }
}

impl Precision {
    pub fn new(scale: u32, display_scale: u32) -> Self {
        Self {
            scale,
            display_scale,
        }
    }

    /// Round a working value to the computation scale (banker's rounding).
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointNearestEven)
    }

    /// Round a value for presentation.
    pub fn display(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.display_scale, RoundingStrategy::MidpointNearestEven)
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision: &Precision,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: format!("rust_decimal_128bit/scale_{}", precision.scale),
        },
    }
}
