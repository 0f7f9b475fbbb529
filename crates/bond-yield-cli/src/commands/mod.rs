pub mod normalize;
pub mod yields;
