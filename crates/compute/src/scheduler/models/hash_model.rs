use sha2::{Digest, Sha256};

use batchfield_core::config::validate_shape;
use batchfield_core::{Contribution, GridShape, Job, Position, Result};

use crate::scheduler::cost::{CostModel, JobContext};

/// Deterministic cost predictor derived from a SHA-256 digest of the job id.
///
/// The same id (and salt) always yields the same cost, so runs are
/// reproducible. With [`HashCostModel::scatter_into`] each job also
/// deposits its cost, scaled, at a digest-chosen cell of the field.
#[derive(Debug, Clone, Default)]
pub struct HashCostModel {
    salt: String,
    scatter: Option<(GridShape, f64)>,
}

impl HashCostModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mix `salt` into every digest, giving a different but still stable assignment.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    /// Make every job contribute `cost * scale` at a digest-chosen position in `shape`.
    /// Fails with `InvalidConfig` if any dimension of `shape` is zero.
    pub fn scatter_into(mut self, shape: GridShape, scale: f64) -> Result<Self> {
        validate_shape(shape)?;
        self.scatter = Some((shape, scale));
        Ok(self)
    }

    fn digest(&self, job: &Job) -> [u8; 32] {
        let out = Sha256::new()
            .chain_update(self.salt.as_bytes())
            .chain_update(job.id.as_bytes())
            .finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&out);
        digest
    }
}

fn word(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

impl CostModel for HashCostModel {
    fn name(&self) -> &str {
        "hash"
    }

    fn cost(&self, job: &Job) -> f64 {
        let digest = self.digest(job);
        word(&digest[..8]) as f64 / u64::MAX as f64
    }

    fn contribution(&self, job: &Job, ctx: &JobContext) -> Option<Contribution> {
        let (shape, scale) = self.scatter?;
        let digest = self.digest(job);
        let pick = |offset: usize, dim: usize| {
            (word(&digest[offset..offset + 8]) % dim as u64) as i64
        };
        let position = Position::new(pick(8, shape.x), pick(16, shape.y), pick(24, shape.z));
        Some(Contribution::new(position, ctx.cost * scale))
    }
}
