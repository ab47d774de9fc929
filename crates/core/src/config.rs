use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BatchfieldError, Result};
use crate::job::GridShape;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Prefix for environment overrides, e.g. `BATCHFIELD_WORKER_COUNT`.
pub const ENV_PREFIX: &str = "BATCHFIELD_";

// ── Policies ──────────────────────────────────────────────────

/// How the cost-sorted job list is cut into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// Exactly `min(target, n)` contiguous slices whose sizes differ by at most one.
    #[default]
    Balanced,
    /// Fixed stride of `max(1, n / target)`; the last batch absorbs the remainder.
    Stride,
}

/// How a job's predicted cost maps to its simulated processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationPolicy {
    /// `max(ε, 1 - cost)` units. Higher cost runs shorter.
    #[default]
    InverseCost,
    /// `max(ε, cost)` units.
    ProportionalCost,
}

/// Lower bound on a simulated duration, in time units.
pub const MIN_DURATION_UNITS: f64 = 0.001;

impl DurationPolicy {
    /// Simulated duration in time units for a cost in `[0, 1]`.
    pub fn units(self, cost: f64) -> f64 {
        let raw = match self {
            DurationPolicy::InverseCost => 1.0 - cost,
            DurationPolicy::ProportionalCost => cost,
        };
        raw.max(MIN_DURATION_UNITS)
    }

    pub fn duration(self, cost: f64, unit: Duration) -> Duration {
        unit.mul_f64(self.units(cost))
    }
}

impl FromStr for PartitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(Self::Balanced),
            "stride" => Ok(Self::Stride),
            other => Err(format!(
                "unknown partition policy '{other}', expected 'balanced' or 'stride'"
            )),
        }
    }
}

impl FromStr for DurationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "inverse_cost" | "inverse" => Ok(Self::InverseCost),
            "proportional_cost" | "proportional" => Ok(Self::ProportionalCost),
            other => Err(format!(
                "unknown duration policy '{other}', expected 'inverse_cost' or 'proportional_cost'"
            )),
        }
    }
}

impl fmt::Display for PartitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balanced => f.write_str("balanced"),
            Self::Stride => f.write_str("stride"),
        }
    }
}

impl fmt::Display for DurationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InverseCost => f.write_str("inverse_cost"),
            Self::ProportionalCost => f.write_str("proportional_cost"),
        }
    }
}

// ── Scheduler config ──────────────────────────────────────────

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of workers in the pool. Must be at least 1.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Number of batches per cycle. `None` means one batch per worker.
    #[serde(default)]
    pub target_batches: Option<usize>,
    /// Shape of the shared accumulator field.
    #[serde(default)]
    pub grid_shape: GridShape,
    #[serde(default)]
    pub partition: PartitionPolicy,
    #[serde(default)]
    pub duration_policy: DurationPolicy,
    /// Length of one simulated work unit in milliseconds. 0 disables sleeping.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    /// Optional per-cycle deadline in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    /// Extra time the scheduler waits for late batch reports after the deadline.
    #[serde(default = "default_deadline_grace_ms")]
    pub deadline_grace_ms: u64,
}

fn default_worker_count() -> usize {
    8
}

fn default_time_unit_ms() -> u64 {
    1000
}

fn default_deadline_grace_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            target_batches: None,
            grid_shape: GridShape::default(),
            partition: PartitionPolicy::default(),
            duration_policy: DurationPolicy::default(),
            time_unit_ms: default_time_unit_ms(),
            deadline_ms: None,
            deadline_grace_ms: default_deadline_grace_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Config with `worker_count` workers and everything else at defaults.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Parse config from a TOML string, apply env overrides, then validate.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config = Self::parse_toml(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string and apply env overrides, without
    /// validating. Callers layering further overrides validate afterwards.
    pub fn parse_toml(toml_str: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Unvalidated config for a layered load: the file at `path` if given,
    /// otherwise defaults, with env overrides applied either way.
    ///
    /// A missing file falls back to defaults with a warning. Unreadable or
    /// malformed files are errors. The caller must run [`validate`](Self::validate)
    /// once its own overrides are in place.
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::env_defaults());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::parse_toml(&content)?;
                info!(path = %path.display(), "loaded scheduler config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::env_defaults())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn env_defaults() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Defaults plus env overrides (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self> {
        let config = Self::env_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Apply `BATCHFIELD_*` environment variable overrides.
    ///
    /// - `BATCHFIELD_WORKER_COUNT` → `worker_count`
    /// - `BATCHFIELD_TARGET_BATCHES` → `target_batches`
    /// - `BATCHFIELD_GRID_SHAPE` (`x,y,z`) → `grid_shape`
    /// - `BATCHFIELD_PARTITION` → `partition`
    /// - `BATCHFIELD_DURATION_POLICY` → `duration_policy`
    /// - `BATCHFIELD_TIME_UNIT_MS` → `time_unit_ms`
    /// - `BATCHFIELD_DEADLINE_MS` → `deadline_ms`
    /// - `BATCHFIELD_DEADLINE_GRACE_MS` → `deadline_grace_ms`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Apply overrides from an arbitrary key lookup. Keys carry the
    /// [`ENV_PREFIX`]. Unparseable values are logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        if let Some(v) = get("WORKER_COUNT") {
            override_parsed("WORKER_COUNT", &v, &mut self.worker_count);
        }
        if let Some(v) = get("TARGET_BATCHES") {
            override_optional("TARGET_BATCHES", &v, &mut self.target_batches);
        }
        if let Some(v) = get("GRID_SHAPE") {
            match parse_shape(&v) {
                Ok(shape) => self.grid_shape = shape,
                Err(e) => {
                    warn!(key = "GRID_SHAPE", value = %v, error = %e, "ignoring override")
                }
            }
        }
        if let Some(v) = get("PARTITION") {
            override_parsed("PARTITION", &v, &mut self.partition);
        }
        if let Some(v) = get("DURATION_POLICY") {
            override_parsed("DURATION_POLICY", &v, &mut self.duration_policy);
        }
        if let Some(v) = get("TIME_UNIT_MS") {
            override_parsed("TIME_UNIT_MS", &v, &mut self.time_unit_ms);
        }
        if let Some(v) = get("DEADLINE_MS") {
            override_optional("DEADLINE_MS", &v, &mut self.deadline_ms);
        }
        if let Some(v) = get("DEADLINE_GRACE_MS") {
            override_parsed("DEADLINE_GRACE_MS", &v, &mut self.deadline_grace_ms);
        }
    }

    // ── Validation ──────────────────────────────────────────────

    /// Reject non-positive worker/batch counts and zero grid dimensions.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(BatchfieldError::InvalidConfig(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.target_batches == Some(0) {
            return Err(BatchfieldError::InvalidConfig(
                "target_batches must be at least 1".into(),
            ));
        }
        validate_shape(self.grid_shape)?;
        Ok(())
    }

    /// Batches per cycle (defaults to one per worker).
    pub fn resolved_target_batches(&self) -> usize {
        self.target_batches.unwrap_or(self.worker_count)
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn deadline_grace(&self) -> Duration {
        Duration::from_millis(self.deadline_grace_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        info!("Scheduler config:");
        info!(
            "  workers:   count={}, target_batches={}",
            self.worker_count,
            self.resolved_target_batches()
        );
        info!("  grid:      shape={}", self.grid_shape);
        info!(
            "  policies:  partition={}, duration={}",
            self.partition, self.duration_policy
        );
        info!(
            "  timing:    unit={}ms, deadline={}",
            self.time_unit_ms,
            self.deadline_ms
                .map(|d| format!("{d}ms"))
                .unwrap_or_else(|| "(none)".into())
        );
    }

    /// Summary as JSON, for machine-readable output.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "worker_count": self.worker_count,
            "target_batches": self.resolved_target_batches(),
            "grid_shape": self.grid_shape,
            "partition": self.partition.to_string(),
            "duration_policy": self.duration_policy.to_string(),
            "time_unit_ms": self.time_unit_ms,
            "deadline_ms": self.deadline_ms,
        })
    }
}

/// Reject shapes with a zero dimension or an overflowing cell count.
pub fn validate_shape(shape: GridShape) -> Result<()> {
    if shape.is_degenerate() {
        return Err(BatchfieldError::InvalidConfig(format!(
            "grid dimensions must be positive, got {shape}"
        )));
    }
    if shape.cell_count().is_none() {
        return Err(BatchfieldError::InvalidConfig(format!(
            "grid {shape} is too large"
        )));
    }
    Ok(())
}

fn override_parsed<T>(key: &str, value: &str, target: &mut T)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value.parse::<T>() {
        Ok(v) => *target = v,
        Err(e) => warn!(key, value, error = %e, "ignoring override"),
    }
}

fn override_optional<T>(key: &str, value: &str, target: &mut Option<T>)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value.parse::<T>() {
        Ok(v) => *target = Some(v),
        Err(e) => warn!(key, value, error = %e, "ignoring override"),
    }
}

/// Parse `x,y,z` (commas or `x` separators) into a shape.
fn parse_shape(s: &str) -> std::result::Result<GridShape, String> {
    let dims: Vec<usize> = s
        .split([',', 'x'])
        .map(|part| part.trim().parse::<usize>().map_err(|e| e.to_string()))
        .collect::<std::result::Result<_, _>>()?;
    match dims.as_slice() {
        [x, y, z] => Ok(GridShape::new(*x, *y, *z)),
        _ => Err(format!("expected three dimensions, got {}", dims.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.resolved_target_batches(), 8);
        assert_eq!(config.grid_shape, GridShape::new(10, 10, 10));
        assert_eq!(config.partition, PartitionPolicy::Balanced);
        assert_eq!(config.duration_policy, DurationPolicy::InverseCost);
        assert_eq!(config.time_unit(), Duration::from_secs(1));
        assert!(config.deadline().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_toml() {
        let config: SchedulerConfig = toml::from_str("worker_count = 2\n").unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.resolved_target_batches(), 2);
        assert_eq!(config.deadline_grace_ms, 100);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
worker_count = 4
target_batches = 6
grid_shape = [4, 5, 6]
partition = "stride"
duration_policy = "proportional_cost"
time_unit_ms = 0
deadline_ms = 2500
deadline_grace_ms = 50
"#;
        let config: SchedulerConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolved_target_batches(), 6);
        assert_eq!(config.grid_shape, GridShape::new(4, 5, 6));
        assert_eq!(config.partition, PartitionPolicy::Stride);
        assert_eq!(config.duration_policy, DurationPolicy::ProportionalCost);
        assert_eq!(config.time_unit(), Duration::ZERO);
        assert_eq!(config.deadline(), Some(Duration::from_millis(2500)));
        assert_eq!(config.deadline_grace(), Duration::from_millis(50));
    }

    #[test]
    fn detect_zero_workers() {
        let err = SchedulerConfig::with_workers(0).validate().unwrap_err();
        assert!(matches!(err, BatchfieldError::InvalidConfig(_)));
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn detect_zero_target_batches() {
        let config = SchedulerConfig {
            target_batches: Some(0),
            ..SchedulerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target_batches"));
    }

    #[test]
    fn detect_degenerate_grid() {
        let config = SchedulerConfig {
            grid_shape: GridShape::new(10, 0, 10),
            ..SchedulerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BatchfieldError::InvalidConfig(_)));
    }

    #[test]
    fn detect_unknown_policy_in_toml() {
        let err = toml::from_str::<SchedulerConfig>("partition = \"random\"\n").unwrap_err();
        assert!(err.to_string().contains("random"), "got: {err}");
    }

    #[test]
    fn overrides_apply() {
        let mut config = SchedulerConfig::default();
        config.apply_overrides_from(lookup(&[
            ("BATCHFIELD_WORKER_COUNT", "3"),
            ("BATCHFIELD_TARGET_BATCHES", "9"),
            ("BATCHFIELD_GRID_SHAPE", "2,3,4"),
            ("BATCHFIELD_PARTITION", "stride"),
            ("BATCHFIELD_DURATION_POLICY", "proportional"),
            ("BATCHFIELD_TIME_UNIT_MS", "5"),
            ("BATCHFIELD_DEADLINE_MS", "750"),
        ]));
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.target_batches, Some(9));
        assert_eq!(config.grid_shape, GridShape::new(2, 3, 4));
        assert_eq!(config.partition, PartitionPolicy::Stride);
        assert_eq!(config.duration_policy, DurationPolicy::ProportionalCost);
        assert_eq!(config.time_unit_ms, 5);
        assert_eq!(config.deadline_ms, Some(750));
    }

    #[test]
    fn bad_overrides_are_ignored() {
        let mut config = SchedulerConfig::default();
        config.apply_overrides_from(lookup(&[
            ("BATCHFIELD_WORKER_COUNT", "many"),
            ("BATCHFIELD_GRID_SHAPE", "2,3"),
            ("BATCHFIELD_PARTITION", "zigzag"),
        ]));
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn shape_override_accepts_x_separator() {
        let mut config = SchedulerConfig::default();
        config.apply_overrides_from(lookup(&[("BATCHFIELD_GRID_SHAPE", "8x8x2")]));
        assert_eq!(config.grid_shape, GridShape::new(8, 8, 2));
    }

    fn temp_config(name: &str, body: &str) -> std::path::PathBuf {
        let file = format!("batchfield-{}-{name}.toml", std::process::id());
        let path = env::temp_dir().join(file);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn layered_load_defers_validation() {
        let path = temp_config("zero-workers", "worker_count = 0\ngrid_shape = [2, 2, 2]\n");
        let mut config = SchedulerConfig::load_layered(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.worker_count, 0);
        assert_eq!(config.grid_shape, GridShape::new(2, 2, 2));
        assert!(config.validate().is_err());

        config.worker_count = 4;
        assert!(config.validate().is_ok());
        assert_eq!(config.grid_shape, GridShape::new(2, 2, 2));
    }

    #[test]
    fn layered_load_keeps_invalid_file_values() {
        let path = temp_config("flat-grid", "grid_shape = [0, 2, 2]\n");
        let config = SchedulerConfig::load_layered(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.grid_shape, GridShape::new(0, 2, 2));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BatchfieldError::InvalidConfig(_)));
    }

    #[test]
    fn layered_load_rejects_malformed_file() {
        let path = temp_config("malformed", "worker_count = \"lots\"\n");
        let err = SchedulerConfig::load_layered(Some(path.as_path())).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, BatchfieldError::ConfigParse(_)));
    }

    #[test]
    fn layered_load_falls_back_when_file_missing() {
        let path = env::temp_dir().join("batchfield-does-not-exist.toml");
        let config = SchedulerConfig::load_layered(Some(path.as_path())).unwrap();
        assert_eq!(config.grid_shape, SchedulerConfig::default().grid_shape);
        assert!(SchedulerConfig::load_layered(None).is_ok());
    }

    #[test]
    fn from_file_still_validates() {
        let path = temp_config("strict", "worker_count = 0\n");
        let err = SchedulerConfig::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, BatchfieldError::InvalidConfig(_)));
    }

    #[test]
    fn inverse_cost_runs_expensive_jobs_shorter() {
        let policy = DurationPolicy::InverseCost;
        assert!(policy.units(0.9) < policy.units(0.1));
        assert_eq!(policy.units(1.0), MIN_DURATION_UNITS);
        assert_eq!(
            policy.duration(0.25, Duration::from_millis(1000)),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn proportional_cost_runs_expensive_jobs_longer() {
        let policy = DurationPolicy::ProportionalCost;
        assert!(policy.units(0.9) > policy.units(0.1));
        assert_eq!(policy.units(0.0), MIN_DURATION_UNITS);
    }

    #[test]
    fn summary_reports_resolved_batches() {
        let summary = SchedulerConfig::with_workers(3).summary();
        assert_eq!(summary["target_batches"], 3);
        assert_eq!(summary["grid_shape"], serde_json::json!([10, 10, 10]));
        assert_eq!(summary["partition"], "balanced");
    }
}
