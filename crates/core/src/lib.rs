pub mod config;
pub mod error;
pub mod job;

pub use config::{DurationPolicy, PartitionPolicy, SchedulerConfig};
pub use error::*;
pub use job::*;
