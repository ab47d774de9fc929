//! Fixed-size worker pool.
//!
//! Workers are logical lanes `0..W` running on a rayon pool of exactly `W`
//! threads. Batch `i` is assigned to worker `i mod W`; a worker runs its
//! batches one after another, and reports each finished batch over an mpsc
//! channel. The caller merges reports only after the barrier.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use batchfield_core::{BatchfieldError, DurationPolicy, GridShape, Position, Result};

use super::cost::{CostModel, JobContext};
use super::types::{Batch, BatchReport, JobOutcome, JobResult, ScoredJob, WorkerState, WorkerStatus};
use crate::field::SpatialGrid;

/// Per-cycle execution parameters shared by every lane.
#[derive(Clone)]
pub struct ExecutionPlan {
    pub cycle_id: Uuid,
    pub model: Arc<dyn CostModel>,
    pub grid_shape: GridShape,
    pub duration_policy: DurationPolicy,
    pub time_unit: Duration,
    /// Jobs not finished by this instant are reported as timed out.
    pub deadline: Option<Instant>,
    /// Raised by the scheduler once it stops listening.
    pub cancel: Arc<AtomicBool>,
}

/// Batches assigned to one worker for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub worker_id: usize,
    pub batches: Vec<Batch>,
}

/// What came back through the barrier.
#[derive(Debug)]
pub struct PoolRun {
    pub reports: Vec<BatchReport>,
    /// Batches with no report, keyed by batch index, with their worker id.
    pub unreported: BTreeMap<usize, (usize, Batch)>,
    /// Every lane hung up before reporting all of its batches.
    pub disconnected: bool,
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: Vec<Arc<RwLock<WorkerState>>>,
}

impl WorkerPool {
    /// Build a pool of `worker_count` workers. Created once and reused across cycles.
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(BatchfieldError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("batchfield-worker-{i}"))
            .panic_handler(|_| error!("worker lane panicked; its unreported batches are lost"))
            .build()
            .map_err(|e| BatchfieldError::ThreadPool(e.to_string()))?;

        let workers = (0..worker_count)
            .map(|id| Arc::new(RwLock::new(WorkerState::new(id))))
            .collect();

        Ok(Self { pool, workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Round-robin: batch `i` goes to worker `i mod W`.
    pub fn worker_for(&self, batch_index: usize) -> usize {
        batch_index % self.size()
    }

    /// Group batches by worker, keeping each worker's batches in planned order.
    /// Workers with nothing to do are left out.
    pub fn assign(&self, batches: Vec<Batch>) -> Vec<Assignment> {
        let mut lanes: Vec<Vec<Batch>> = vec![Vec::new(); self.size()];
        for batch in batches {
            lanes[self.worker_for(batch.index)].push(batch);
        }
        lanes
            .into_iter()
            .enumerate()
            .filter(|(_, batches)| !batches.is_empty())
            .map(|(worker_id, batches)| Assignment { worker_id, batches })
            .collect()
    }

    /// Snapshot of every worker's diagnostic state.
    pub fn states(&self) -> Vec<WorkerState> {
        self.workers
            .iter()
            .map(|w| match w.read() {
                Ok(state) => state.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            })
            .collect()
    }

    /// Run every batch and block until all reports arrive, the lanes hang
    /// up, or `wait_until` passes.
    pub fn assign_and_run(
        &self,
        batches: Vec<Batch>,
        plan: &ExecutionPlan,
        wait_until: Option<Instant>,
    ) -> PoolRun {
        let mut unreported: BTreeMap<usize, (usize, Batch)> = batches
            .iter()
            .map(|b| (b.index, (self.worker_for(b.index), b.clone())))
            .collect();

        let (tx, rx) = mpsc::channel::<BatchReport>();
        for assignment in self.assign(batches) {
            let tx = tx.clone();
            let plan = plan.clone();
            let state = Arc::clone(&self.workers[assignment.worker_id]);
            self.pool.spawn(move || run_lane(assignment, &plan, &state, &tx));
        }
        drop(tx);

        let mut reports = Vec::with_capacity(unreported.len());
        let mut disconnected = false;
        while !unreported.is_empty() {
            let received = match wait_until {
                Some(until) => {
                    let now = Instant::now();
                    if now >= until {
                        break;
                    }
                    match rx.recv_timeout(until - now) {
                        Ok(report) => report,
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => {
                            disconnected = true;
                            break;
                        }
                    }
                }
                None => match rx.recv() {
                    Ok(report) => report,
                    Err(_) => {
                        disconnected = true;
                        break;
                    }
                },
            };
            unreported.remove(&received.batch_index);
            reports.push(received);
        }

        if !unreported.is_empty() {
            warn!(
                cycle_id = %plan.cycle_id,
                missing_batches = unreported.len(),
                disconnected,
                "barrier released with unreported batches"
            );
        }

        PoolRun {
            reports,
            unreported,
            disconnected,
        }
    }
}

/// One worker's sequential pass over its assigned batches.
fn run_lane(
    assignment: Assignment,
    plan: &ExecutionPlan,
    state: &RwLock<WorkerState>,
    tx: &Sender<BatchReport>,
) {
    let worker_id = assignment.worker_id;
    let mut batches = assignment.batches.into_iter().peekable();
    while let Some(batch) = batches.next() {
        debug!(
            cycle_id = %plan.cycle_id,
            worker_id,
            batch = batch.index,
            jobs = batch.len(),
            "batch started"
        );
        let report = run_batch(worker_id, batch, plan, state);
        // Idle must be visible before the last report releases the barrier.
        if batches.peek().is_none() {
            mark_idle(state);
        }
        if tx.send(report).is_err() {
            debug!(cycle_id = %plan.cycle_id, worker_id, "scheduler stopped listening");
            mark_idle(state);
            break;
        }
    }
}

fn mark_idle(state: &RwLock<WorkerState>) {
    if let Ok(mut s) = state.write() {
        s.status = WorkerStatus::Idle;
    }
}

fn run_batch(
    worker_id: usize,
    batch: Batch,
    plan: &ExecutionPlan,
    state: &RwLock<WorkerState>,
) -> BatchReport {
    let batch_index = batch.index;
    let mut partial: Option<SpatialGrid> = None;
    let results = batch
        .jobs
        .into_iter()
        .map(|scored| run_job(worker_id, batch_index, scored, plan, state, &mut partial))
        .collect();

    BatchReport {
        batch_index,
        worker_id,
        results,
        partial,
    }
}

fn run_job(
    worker_id: usize,
    batch_index: usize,
    scored: ScoredJob,
    plan: &ExecutionPlan,
    state: &RwLock<WorkerState>,
    partial: &mut Option<SpatialGrid>,
) -> JobResult {
    let expired = |now: Instant| plan.deadline.is_some_and(|d| now >= d);
    if plan.cancel.load(Ordering::Relaxed) || expired(Instant::now()) {
        return JobResult::timed_out(plan.cycle_id, worker_id, batch_index, scored, Duration::ZERO);
    }

    if let Ok(mut s) = state.write() {
        s.status = WorkerStatus::Busy;
        s.last_job = Some(scored.job.id.clone());
    }

    let start = Instant::now();
    let target = plan.duration_policy.duration(scored.cost, plan.time_unit);
    let sleep_for = match plan.deadline {
        Some(deadline) => target.min(deadline.saturating_duration_since(start)),
        None => target,
    };
    if !sleep_for.is_zero() {
        std::thread::sleep(sleep_for);
    }

    let outcome = if sleep_for < target {
        JobOutcome::TimedOut
    } else {
        let ctx = JobContext {
            worker_id,
            batch_index,
            cost: scored.cost,
        };
        match plan.model.contribution(&scored.job, &ctx) {
            None => JobOutcome::Completed,
            Some(c) => match contribute(partial, plan.grid_shape, c.position, c.delta) {
                Ok(()) => JobOutcome::Completed,
                Err(e) => {
                    warn!(worker_id, job = %scored.job, error = %e, "contribution rejected");
                    JobOutcome::Failed(e.to_string())
                }
            },
        }
    };

    if let Ok(mut s) = state.write() {
        s.jobs_processed += 1;
    }

    JobResult {
        cycle_id: plan.cycle_id,
        job: scored.job,
        worker_id,
        batch_index,
        cost: scored.cost,
        outcome,
        duration: start.elapsed(),
        finished_at: Utc::now(),
    }
}

/// Accumulate into the lane's private grid, creating it on first use.
fn contribute(
    partial: &mut Option<SpatialGrid>,
    shape: GridShape,
    position: Position,
    delta: f64,
) -> Result<()> {
    if partial.is_none() {
        *partial = Some(SpatialGrid::new(shape)?);
    }
    if let Some(grid) = partial.as_mut() {
        grid.accumulate(position, delta)?;
    }
    Ok(())
}
