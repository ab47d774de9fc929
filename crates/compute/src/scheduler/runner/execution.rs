use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use batchfield_core::{BatchfieldError, Job, Result};

use crate::scheduler::pool::{ExecutionPlan, PoolRun};
use crate::scheduler::types::{JobResult, ScheduleReport};

use super::JobScheduler;

impl JobScheduler {
    /// Run one scheduling cycle over `jobs` and block until it is done.
    ///
    /// Returns exactly one result per job in no particular order. With a
    /// deadline configured, unfinished jobs come back as timed out; without
    /// one, a lane that dies before reporting fails the call with
    /// [`BatchfieldError::IncompleteSchedule`].
    pub fn schedule(&self, jobs: &[Job]) -> Result<ScheduleReport> {
        let start = Instant::now();
        let cycle_id = Uuid::new_v4();

        let batches = self.plan(jobs)?;
        let summaries = self.summarize(&batches);
        info!(
            cycle_id = %cycle_id,
            jobs = jobs.len(),
            batches = batches.len(),
            workers = self.pool.size(),
            "cycle starting"
        );

        let deadline = self.config.deadline().map(|d| start + d);
        let plan = ExecutionPlan {
            cycle_id,
            model: Arc::clone(&self.model),
            grid_shape: self.config.grid_shape,
            duration_policy: self.config.duration_policy,
            time_unit: self.config.time_unit(),
            deadline,
            cancel: Arc::new(AtomicBool::new(false)),
        };

        let run = if batches.is_empty() {
            PoolRun {
                reports: Vec::new(),
                unreported: BTreeMap::new(),
                disconnected: false,
            }
        } else {
            let wait_until = deadline.map(|d| d + self.config.deadline_grace());
            self.pool.assign_and_run(batches, &plan, wait_until)
        };
        // Barrier released; stragglers from this cycle stop at their next job.
        plan.cancel.store(true, Ordering::Relaxed);

        let results = self.merge(cycle_id, run, deadline.is_some())?;
        ensure_complete(jobs, &results)?;

        let report = ScheduleReport::new(cycle_id, results, summaries, start.elapsed());
        if let Ok(mut m) = self.metrics.write() {
            m.record_cycle(&report);
        }
        info!(
            cycle_id = %cycle_id,
            completed = report.completed,
            timed_out = report.timed_out,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "cycle complete"
        );
        Ok(report)
    }

    /// Run one cycle and return just the results.
    pub fn schedule_jobs(&self, jobs: &[Job]) -> Result<Vec<JobResult>> {
        self.schedule(jobs).map(|report| report.results)
    }

    /// Post-barrier merge: sum partial grids into the shared field and
    /// gather per-batch results. Batches that missed the deadline are
    /// filled in as timed out.
    fn merge(&self, cycle_id: Uuid, run: PoolRun, has_deadline: bool) -> Result<Vec<JobResult>> {
        let mut results = Vec::new();
        for report in run.reports {
            if let Some(partial) = &report.partial {
                self.field.merge_partial(partial)?;
            }
            debug!(
                cycle_id = %cycle_id,
                batch = report.batch_index,
                worker_id = report.worker_id,
                jobs = report.results.len(),
                "batch merged"
            );
            results.extend(report.results);
        }

        if has_deadline && !run.disconnected {
            for (batch_index, (worker_id, batch)) in run.unreported {
                warn!(
                    cycle_id = %cycle_id,
                    batch = batch_index,
                    worker_id,
                    jobs = batch.len(),
                    "batch missed the deadline"
                );
                results.extend(batch.jobs.into_iter().map(|scored| {
                    JobResult::timed_out(cycle_id, worker_id, batch_index, scored, Duration::ZERO)
                }));
            }
        }
        Ok(results)
    }
}

/// Every submitted job must have exactly one result.
fn ensure_complete(jobs: &[Job], results: &[JobResult]) -> Result<()> {
    let reported: HashSet<&str> = results.iter().map(|r| r.job.id.as_str()).collect();
    let missing: Vec<String> = jobs
        .iter()
        .filter(|job| !reported.contains(job.id.as_str()))
        .map(|job| job.id.clone())
        .collect();

    if !missing.is_empty() || results.len() != jobs.len() {
        return Err(BatchfieldError::IncompleteSchedule { missing });
    }
    Ok(())
}
