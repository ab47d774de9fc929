//! Cost-aware batch scheduler over a fixed worker pool.
//!
//! The [`JobScheduler`] scores jobs with a [`CostModel`], cuts the
//! cost-sorted list into batches with the [`BatchPlanner`], runs the
//! batches on the [`WorkerPool`] (batch `i` on worker `i mod W`) and, once
//! every lane has reported, merges per-batch results and partial grids.

pub mod cost;
pub mod metrics;
pub mod models;
pub mod planner;
pub mod pool;
pub mod runner;
pub mod types;

pub use cost::{normalize_cost, CostModel, JobContext};
pub use metrics::SchedulerMetrics;
pub use models::{FixedCostModel, HashCostModel};
pub use planner::{partition_sizes, BatchPlanner};
pub use pool::WorkerPool;
pub use runner::JobScheduler;
pub use types::{
    Batch, BatchSummary, JobOutcome, JobResult, ScheduleReport, ScoredJob, WorkerState,
    WorkerStatus,
};
