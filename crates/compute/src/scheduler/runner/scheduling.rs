use std::collections::HashSet;

use batchfield_core::{BatchfieldError, Job, Result};

use crate::scheduler::types::{Batch, BatchSummary};

use super::JobScheduler;

impl JobScheduler {
    /// Plan the batches a cycle over `jobs` would run, without running them.
    pub fn plan(&self, jobs: &[Job]) -> Result<Vec<Batch>> {
        ensure_unique_ids(jobs)?;
        self.planner.plan(
            jobs,
            self.model.as_ref(),
            self.config.resolved_target_batches(),
        )
    }

    /// Record planned batches with their assigned worker.
    pub(super) fn summarize(&self, batches: &[Batch]) -> Vec<BatchSummary> {
        batches
            .iter()
            .map(|b| BatchSummary {
                index: b.index,
                worker_id: self.pool.worker_for(b.index),
                job_ids: b.job_ids(),
                total_cost: b.total_cost(),
            })
            .collect()
    }
}

/// Job ids identify results, so they must be unique within a cycle.
fn ensure_unique_ids(jobs: &[Job]) -> Result<()> {
    let mut seen = HashSet::with_capacity(jobs.len());
    for job in jobs {
        if !seen.insert(job.id.as_str()) {
            return Err(BatchfieldError::DuplicateJob(job.id.clone()));
        }
    }
    Ok(())
}
