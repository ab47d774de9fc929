pub mod field;
pub mod scheduler;

pub use field::{FieldAccumulator, SharedField, SpatialGrid};
pub use scheduler::{
    BatchPlanner, CostModel, FixedCostModel, HashCostModel, JobContext, JobOutcome, JobResult,
    JobScheduler, ScheduleReport, SchedulerMetrics, WorkerPool,
};
