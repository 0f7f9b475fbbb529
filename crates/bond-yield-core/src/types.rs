use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values and prices. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%).
pub type Rate = Decimal;

/// Rates expressed as percentages (5.0 = 5%), the way bond terms are quoted.
pub type Percent = Decimal;

/// What a cash flow pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowKind {
    /// Purchase price plus accrued interest paid at settlement
    Settlement,
    /// Periodic coupon
    Coupon,
    /// Redemption price plus accrued interest at maturity
    Redemption,
    /// Sale proceeds plus accrued interest on an early exit
    Exit,
}

impl CashFlowKind {
    /// Priority used when legs falling on the same date are merged into one flow.
    pub(crate) fn rank(self) -> u8 {
        match self {
            CashFlowKind::Coupon => 0,
            CashFlowKind::Settlement => 1,
            CashFlowKind::Redemption => 2,
            CashFlowKind::Exit => 3,
        }
    }
}

/// A single cash flow at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlow {
    pub date: NaiveDate,
    pub amount: Money,
    pub kind: CashFlowKind,
}

impl CashFlow {
    pub fn new(date: NaiveDate, amount: Money, kind: CashFlowKind) -> Self {
        Self { date, amount, kind }
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
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
