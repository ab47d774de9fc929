use batchfield_core::{Contribution, Job};

/// What a worker knows about the job it is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobContext {
    pub worker_id: usize,
    pub batch_index: usize,
    /// Normalized cost the planner assigned to this job.
    pub cost: f64,
}

/// Predicts how expensive a job is and what it contributes to the field.
///
/// Implementations must be deterministic within one scheduling cycle:
/// the planner scores every job exactly once and reuses that score for
/// the worker's duration calculation.
pub trait CostModel: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "cost-model"
    }

    /// Predicted cost in `[0, 1]`. Out-of-range values are clamped.
    fn cost(&self, job: &Job) -> f64;

    /// Field contribution produced once the job finishes, if any.
    fn contribution(&self, _job: &Job, _ctx: &JobContext) -> Option<Contribution> {
        None
    }
}

impl<F> CostModel for F
where
    F: Fn(&Job) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn cost(&self, job: &Job) -> f64 {
        self(job)
    }
}

/// Clamp a raw model score into `[0, 1]`; `NaN` becomes `0.0`.
pub fn normalize_cost(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}
