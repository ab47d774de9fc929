use std::collections::HashMap;

use batchfield_core::{Contribution, Job, Position};

use crate::scheduler::cost::{CostModel, JobContext};

/// Cost model backed by an explicit table. Unlisted jobs get the fallback cost.
#[derive(Debug, Clone, Default)]
pub struct FixedCostModel {
    costs: HashMap<String, f64>,
    fallback: f64,
    contribution: Option<Contribution>,
}

impl FixedCostModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job costs `cost`.
    pub fn uniform(cost: f64) -> Self {
        Self {
            fallback: cost,
            ..Self::default()
        }
    }

    pub fn with_cost(mut self, job_id: impl Into<String>, cost: f64) -> Self {
        self.costs.insert(job_id.into(), cost);
        self
    }

    pub fn with_costs<I, K>(mut self, costs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.costs
            .extend(costs.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Every completed job adds `delta` at `position`.
    pub fn contributing(mut self, position: impl Into<Position>, delta: f64) -> Self {
        self.contribution = Some(Contribution::new(position, delta));
        self
    }
}

impl CostModel for FixedCostModel {
    fn name(&self) -> &str {
        "fixed"
    }

    fn cost(&self, job: &Job) -> f64 {
        self.costs.get(&job.id).copied().unwrap_or(self.fallback)
    }

    fn contribution(&self, _job: &Job, _ctx: &JobContext) -> Option<Contribution> {
        self.contribution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_with_fallback() {
        let model = FixedCostModel::uniform(0.5)
            .with_cost("A", 0.1)
            .with_costs([("B", 0.9)]);
        assert_eq!(model.cost(&Job::new("A")), 0.1);
        assert_eq!(model.cost(&Job::new("B")), 0.9);
        assert_eq!(model.cost(&Job::new("Z")), 0.5);
    }

    #[test]
    fn contributing_applies_to_every_job() {
        let model = FixedCostModel::new().contributing((1, 2, 3), 1.0);
        let ctx = JobContext {
            worker_id: 3,
            batch_index: 7,
            cost: 0.0,
        };
        let c = model.contribution(&Job::new("x"), &ctx).unwrap();
        assert_eq!(c.position, Position::new(1, 2, 3));
        assert_eq!(c.delta, 1.0);
    }
}
