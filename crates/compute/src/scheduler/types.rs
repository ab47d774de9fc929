use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use batchfield_core::Job;

use crate::field::SpatialGrid;

/// A job paired with the cost the planner assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredJob {
    pub job: Job,
    pub cost: f64,
}

/// Contiguous slice of the cost-sorted job list, run by one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// Position in the planned batch sequence. Batch `i` runs on worker `i mod W`.
    pub index: usize,
    pub jobs: Vec<ScoredJob>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|s| s.job.id.clone()).collect()
    }

    pub fn total_cost(&self) -> f64 {
        self.jobs.iter().map(|s| s.cost).sum()
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    /// The cycle deadline passed before the job finished.
    TimedOut,
    /// The job ran but its field contribution was rejected.
    Failed(String),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }
}

/// One result per submitted job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub cycle_id: Uuid,
    pub job: Job,
    pub worker_id: usize,
    pub batch_index: usize,
    pub cost: f64,
    pub outcome: JobOutcome,
    /// Measured wall time spent on the job.
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub(crate) fn timed_out(
        cycle_id: Uuid,
        worker_id: usize,
        batch_index: usize,
        scored: ScoredJob,
        duration: Duration,
    ) -> Self {
        Self {
            cycle_id,
            job: scored.job,
            worker_id,
            batch_index,
            cost: scored.cost,
            outcome: JobOutcome::TimedOut,
            duration,
            finished_at: Utc::now(),
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.duration.as_secs_f64();
        match &self.outcome {
            JobOutcome::Completed => write!(
                f,
                "Worker {} completed job {} in {:.3}s",
                self.worker_id, self.job, secs
            ),
            JobOutcome::TimedOut => write!(
                f,
                "Worker {} timed out on job {} after {:.3}s",
                self.worker_id, self.job, secs
            ),
            JobOutcome::Failed(reason) => write!(
                f,
                "Worker {} failed job {} after {:.3}s: {}",
                self.worker_id, self.job, secs, reason
            ),
        }
    }
}

/// What a worker lane sends back for one finished batch.
#[derive(Debug)]
pub struct BatchReport {
    pub batch_index: usize,
    pub worker_id: usize,
    pub results: Vec<JobResult>,
    /// Private partial grid holding this batch's contributions, if any.
    pub partial: Option<SpatialGrid>,
}

/// Planned batch as recorded in a [`ScheduleReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub worker_id: usize,
    pub job_ids: Vec<String>,
    pub total_cost: f64,
}

/// Outcome of one scheduling cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub cycle_id: Uuid,
    /// Exactly one entry per submitted job, in no particular order.
    pub results: Vec<JobResult>,
    pub batches: Vec<BatchSummary>,
    pub elapsed: Duration,
    pub completed: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl ScheduleReport {
    pub(crate) fn new(
        cycle_id: Uuid,
        results: Vec<JobResult>,
        batches: Vec<BatchSummary>,
        elapsed: Duration,
    ) -> Self {
        let mut completed = 0;
        let mut timed_out = 0;
        let mut failed = 0;
        for r in &results {
            match r.outcome {
                JobOutcome::Completed => completed += 1,
                JobOutcome::TimedOut => timed_out += 1,
                JobOutcome::Failed(_) => failed += 1,
            }
        }
        Self {
            cycle_id,
            results,
            batches,
            elapsed,
            completed,
            timed_out,
            failed,
        }
    }

    /// Results ordered by job id.
    pub fn sorted_results(&self) -> Vec<&JobResult> {
        let mut sorted: Vec<&JobResult> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.job.id.cmp(&b.job.id));
        sorted
    }

    /// Result for a given job id.
    pub fn result_for(&self, job_id: &str) -> Option<&JobResult> {
        self.results.iter().find(|r| r.job.id == job_id)
    }

    /// Number of results per worker id.
    pub fn jobs_per_worker(&self) -> HashMap<usize, usize> {
        let mut counts = HashMap::new();
        for r in &self.results {
            *counts.entry(r.worker_id).or_default() += 1;
        }
        counts
    }
}

/// Execution state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// Diagnostic bookkeeping for one worker. Nothing here affects outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerState {
    pub id: usize,
    pub status: WorkerStatus,
    pub last_job: Option<String>,
    pub jobs_processed: u64,
}

impl WorkerState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            last_job: None,
            jobs_processed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, worker_id: usize, outcome: JobOutcome) -> JobResult {
        JobResult {
            cycle_id: Uuid::nil(),
            job: Job::new(id),
            worker_id,
            batch_index: 0,
            cost: 0.5,
            outcome,
            duration: Duration::from_millis(1500),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn display_matches_worker_log_line() {
        let r = result("ShaderJob_4", 2, JobOutcome::Completed);
        assert_eq!(r.to_string(), "Worker 2 completed job ShaderJob_4 in 1.500s");
        let t = result("ShaderJob_5", 1, JobOutcome::TimedOut);
        assert_eq!(t.to_string(), "Worker 1 timed out on job ShaderJob_5 after 1.500s");
    }

    #[test]
    fn report_counts_outcomes() {
        let report = ScheduleReport::new(
            Uuid::nil(),
            vec![
                result("b", 0, JobOutcome::Completed),
                result("a", 1, JobOutcome::TimedOut),
                result("c", 1, JobOutcome::Failed("out of bounds".into())),
            ],
            vec![],
            Duration::ZERO,
        );
        assert_eq!(report.completed, 1);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.failed, 1);

        let ids: Vec<&str> = report.sorted_results().iter().map(|r| r.job.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.jobs_per_worker()[&1], 2);
        assert!(report.result_for("c").is_some());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(JobOutcome::Failed("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "reason": "boom"}));
        let json = serde_json::to_value(JobOutcome::Completed).unwrap();
        assert_eq!(json, serde_json::json!({"status": "completed"}));
    }

    #[test]
    fn batch_helpers() {
        let batch = Batch {
            index: 0,
            jobs: vec![
                ScoredJob {
                    job: Job::new("A"),
                    cost: 0.1,
                },
                ScoredJob {
                    job: Job::new("C"),
                    cost: 0.3,
                },
            ],
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.job_ids(), vec!["A", "C"]);
        assert!((batch.total_cost() - 0.4).abs() < 1e-12);
    }
}
