use tracing::debug;

use batchfield_core::{BatchfieldError, Job, PartitionPolicy, Result};

use super::cost::{normalize_cost, CostModel};
use super::types::{Batch, ScoredJob};

/// Orders jobs by predicted cost and cuts them into contiguous batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPlanner {
    policy: PartitionPolicy,
}

impl BatchPlanner {
    pub fn new(policy: PartitionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    /// Score every job once, stable-sort ascending by cost, then partition.
    ///
    /// Ties keep input order. Zero jobs yield no batches; a zero target is
    /// rejected before anything is scored.
    pub fn plan(
        &self,
        jobs: &[Job],
        model: &dyn CostModel,
        target_batches: usize,
    ) -> Result<Vec<Batch>> {
        if target_batches == 0 {
            return Err(BatchfieldError::InvalidConfig(
                "target_batches must be at least 1".into(),
            ));
        }
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredJob> = jobs
            .iter()
            .map(|job| ScoredJob {
                job: job.clone(),
                cost: normalize_cost(model.cost(job)),
            })
            .collect();
        scored.sort_by(|a, b| a.cost.total_cmp(&b.cost));

        let sizes = partition_sizes(scored.len(), target_batches, self.policy);
        debug!(
            model = model.name(),
            jobs = jobs.len(),
            target_batches,
            policy = %self.policy,
            ?sizes,
            "planned batches"
        );

        let mut remaining = scored.into_iter();
        let batches = sizes
            .into_iter()
            .enumerate()
            .map(|(index, size)| Batch {
                index,
                jobs: remaining.by_ref().take(size).collect(),
            })
            .collect();
        Ok(batches)
    }
}

/// Batch sizes for `n` jobs split toward `target` batches.
///
/// Sizes always sum to `n` and there are never more than `target` of them.
pub fn partition_sizes(n: usize, target: usize, policy: PartitionPolicy) -> Vec<usize> {
    if n == 0 || target == 0 {
        return Vec::new();
    }
    match policy {
        PartitionPolicy::Balanced => {
            let k = target.min(n);
            let base = n / k;
            let extra = n % k;
            (0..k).map(|i| if i < extra { base + 1 } else { base }).collect()
        }
        PartitionPolicy::Stride => {
            let stride = (n / target).max(1);
            let k = target.min(n.div_ceil(stride));
            let mut sizes = vec![stride; k];
            if let Some(last) = sizes.last_mut() {
                *last = n - (k - 1) * stride;
            }
            sizes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::models::FixedCostModel;

    fn jobs(ids: &[&str]) -> Vec<Job> {
        ids.iter().map(|id| Job::new(*id)).collect()
    }

    fn ids(batch: &Batch) -> Vec<&str> {
        batch.jobs.iter().map(|s| s.job.id.as_str()).collect()
    }

    #[test]
    fn single_batch_sorted_ascending() {
        let input: Vec<Job> = (1..=10).map(|i| Job::new(format!("j{i}"))).collect();
        // Descending costs so sorting has to reverse the input.
        let model = |job: &Job| {
            let n: f64 = job.id[1..].parse().unwrap();
            1.0 - n / 10.0
        };

        let batches = BatchPlanner::default().plan(&input, &model, 1).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(ids(&batches[0])[0], "j10");
        assert_eq!(ids(&batches[0])[9], "j1");
        assert!(batches[0].jobs.windows(2).all(|w| w[0].cost <= w[1].cost));
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let model = FixedCostModel::uniform(0.5);
        for target in 1..=8 {
            for policy in [PartitionPolicy::Balanced, PartitionPolicy::Stride] {
                let batches = BatchPlanner::new(policy).plan(&[], &model, target).unwrap();
                assert!(batches.is_empty());
            }
        }
    }

    #[test]
    fn zero_target_rejected() {
        let model = FixedCostModel::uniform(0.5);
        let err = BatchPlanner::default()
            .plan(&jobs(&["a"]), &model, 0)
            .unwrap_err();
        assert!(matches!(err, BatchfieldError::InvalidConfig(_)));
    }

    #[test]
    fn low_and_high_cost_batches() {
        let model = FixedCostModel::new()
            .with_cost("A", 0.1)
            .with_cost("B", 0.9)
            .with_cost("C", 0.3)
            .with_cost("D", 0.7);
        for policy in [PartitionPolicy::Balanced, PartitionPolicy::Stride] {
            let batches = BatchPlanner::new(policy)
                .plan(&jobs(&["A", "B", "C", "D"]), &model, 2)
                .unwrap();
            assert_eq!(batches.len(), 2);
            assert_eq!(ids(&batches[0]), vec!["A", "C"]);
            assert_eq!(ids(&batches[1]), vec!["D", "B"]);
            assert_eq!(batches[1].index, 1);
        }
    }

    #[test]
    fn ties_keep_input_order() {
        let model = FixedCostModel::uniform(0.5).with_cost("first", 0.2);
        let batches = BatchPlanner::default()
            .plan(&jobs(&["x", "y", "first", "z"]), &model, 1)
            .unwrap();
        assert_eq!(ids(&batches[0]), vec!["first", "x", "y", "z"]);
    }

    #[test]
    fn out_of_range_costs_are_clamped() {
        let model = FixedCostModel::new()
            .with_cost("neg", -4.0)
            .with_cost("big", 12.0)
            .with_cost("nan", f64::NAN);
        let batches = BatchPlanner::default()
            .plan(&jobs(&["big", "neg", "nan"]), &model, 1)
            .unwrap();
        let costs: Vec<f64> = batches[0].jobs.iter().map(|s| s.cost).collect();
        assert_eq!(costs, vec![0.0, 0.0, 1.0]);
        assert_eq!(ids(&batches[0]), vec!["neg", "nan", "big"]);
    }

    #[test]
    fn balanced_sizes() {
        assert_eq!(partition_sizes(10, 3, PartitionPolicy::Balanced), vec![4, 3, 3]);
        assert_eq!(partition_sizes(10, 4, PartitionPolicy::Balanced), vec![3, 3, 2, 2]);
        assert_eq!(partition_sizes(3, 8, PartitionPolicy::Balanced), vec![1, 1, 1]);
        assert_eq!(partition_sizes(8, 8, PartitionPolicy::Balanced), vec![1; 8]);
    }

    #[test]
    fn stride_last_batch_absorbs_remainder() {
        assert_eq!(partition_sizes(10, 3, PartitionPolicy::Stride), vec![3, 3, 4]);
        assert_eq!(partition_sizes(10, 4, PartitionPolicy::Stride), vec![2, 2, 2, 4]);
        assert_eq!(
            partition_sizes(100, 8, PartitionPolicy::Stride),
            vec![12, 12, 12, 12, 12, 12, 12, 16]
        );
        // Fewer jobs than batches collapses to single-job batches.
        assert_eq!(partition_sizes(3, 8, PartitionPolicy::Stride), vec![1, 1, 1]);
    }

    #[test]
    fn batches_partition_input_exactly() {
        let input: Vec<Job> = (0..37).map(|i| Job::new(format!("job-{i}"))).collect();
        let model = crate::scheduler::models::HashCostModel::new();
        for policy in [PartitionPolicy::Balanced, PartitionPolicy::Stride] {
            for target in 1..=12 {
                let batches = BatchPlanner::new(policy).plan(&input, &model, target).unwrap();
                assert!(batches.len() <= target);
                assert!(batches.iter().all(|b| !b.is_empty()));

                let mut seen: Vec<String> = batches.iter().flat_map(|b| b.job_ids()).collect();
                seen.sort();
                let mut expected: Vec<String> = input.iter().map(|j| j.id.clone()).collect();
                expected.sort();
                assert_eq!(seen, expected, "policy {policy} target {target}");
            }
        }
    }
}
