use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::types::{JobOutcome, JobResult, ScheduleReport};

/// Scheduler operational metrics, accumulated across cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Scheduling cycles completed.
    pub cycles_run: u64,
    pub jobs_completed: u64,
    pub jobs_timed_out: u64,
    pub jobs_failed: u64,
    /// Jobs executed per worker id.
    pub jobs_executed: HashMap<usize, u64>,
    /// Rolling mean job duration per worker id.
    pub avg_job_duration: HashMap<usize, Duration>,
    /// Last time each worker finished a job.
    pub last_run: HashMap<usize, DateTime<Utc>>,
    pub last_cycle_id: Option<Uuid>,
    pub last_cycle_duration: Option<Duration>,
}

impl SchedulerMetrics {
    /// Record one job execution on a worker.
    pub fn record_execution(&mut self, worker_id: usize, duration: Duration, at: DateTime<Utc>) {
        *self.jobs_executed.entry(worker_id).or_default() += 1;
        self.last_run.insert(worker_id, at);

        let count = self.jobs_executed[&worker_id];
        let prev_avg = self
            .avg_job_duration
            .get(&worker_id)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_job_duration.insert(worker_id, new_avg);
    }

    /// Count one result. Per-worker execution stats only cover jobs that
    /// ran to the end; timed-out jobs are counted but not timed.
    pub fn record_result(&mut self, result: &JobResult) {
        match result.outcome {
            JobOutcome::Completed => self.jobs_completed += 1,
            JobOutcome::TimedOut => {
                self.jobs_timed_out += 1;
                return;
            }
            JobOutcome::Failed(_) => self.jobs_failed += 1,
        }
        self.record_execution(result.worker_id, result.duration, result.finished_at);
    }

    /// Fold a whole cycle into the metrics.
    pub fn record_cycle(&mut self, report: &ScheduleReport) {
        self.cycles_run += 1;
        self.last_cycle_id = Some(report.cycle_id);
        self.last_cycle_duration = Some(report.elapsed);
        for result in &report.results {
            self.record_result(result);
        }
    }

    /// Total jobs seen across all outcomes.
    pub fn jobs_total(&self) -> u64 {
        self.jobs_completed + self.jobs_timed_out + self.jobs_failed
    }
}
