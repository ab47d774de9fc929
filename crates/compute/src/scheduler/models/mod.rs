mod fixed_model;
mod hash_model;

pub use fixed_model::FixedCostModel;
pub use hash_model::HashCostModel;
