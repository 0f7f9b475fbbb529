pub mod calendar;
pub mod error;
pub mod fixed_income;
pub mod normalize;
pub mod time_value;
pub mod types;

pub use error::BondYieldError;
pub use types::*;

/// Standard result type for all bond yield operations
pub type BondYieldResult<T> = Result<T, BondYieldError>;
