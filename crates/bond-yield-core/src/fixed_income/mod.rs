pub mod accrual;
pub mod assembler;
pub mod bond;
pub mod metadata;
pub mod schedule;
pub mod tax;
pub mod yields;
