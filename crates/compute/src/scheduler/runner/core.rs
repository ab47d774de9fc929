use std::sync::{Arc, RwLock};

use tracing::info;

use batchfield_core::{Position, Result, SchedulerConfig};

use crate::field::SharedField;
use crate::scheduler::cost::CostModel;
use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::planner::BatchPlanner;
use crate::scheduler::pool::WorkerPool;
use crate::scheduler::types::WorkerState;

/// The job scheduler. Plans cost-ordered batches, runs them on a fixed
/// [`WorkerPool`], and merges results and field contributions after the
/// join barrier.
pub struct JobScheduler {
    pub(super) config: SchedulerConfig,
    pub(super) planner: BatchPlanner,
    /// Created once, reused for every cycle.
    pub(super) pool: WorkerPool,
    pub(super) model: Arc<dyn CostModel>,
    /// Shared accumulator field written after each barrier.
    pub(super) field: SharedField,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
}

impl JobScheduler {
    /// Validate `config` and build the pool and field.
    pub fn new(config: SchedulerConfig, model: Arc<dyn CostModel>) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_count)?;
        let field = SharedField::new(config.grid_shape)?;
        info!(
            "Scheduler ready: {} workers, {} target batches, grid {}, cost model {}",
            config.worker_count,
            config.resolved_target_batches(),
            config.grid_shape,
            model.name()
        );
        Ok(Self {
            planner: BatchPlanner::new(config.partition),
            config,
            pool,
            model,
            field,
            metrics: Arc::new(RwLock::new(SchedulerMetrics::default())),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Handle to the shared field. Clones share state.
    pub fn field(&self) -> SharedField {
        self.field.clone()
    }

    /// Point query on the shared field.
    pub fn query(&self, pos: Position) -> Result<f64> {
        self.field.query(pos)
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        match self.metrics.read() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Get an Arc to the metrics (for external reads without cloning).
    pub fn metrics_handle(&self) -> Arc<RwLock<SchedulerMetrics>> {
        Arc::clone(&self.metrics)
    }

    /// Diagnostic state of every worker.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.pool.states()
    }
}
