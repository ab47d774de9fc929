//! batchfield: run one scheduling cycle over generated jobs.
//!
//! Jobs are named `job-0` .. `job-{n-1}` and scored by the hash cost model,
//! which also scatters each job's cost into the shared field. Results are
//! printed one per line, or as a JSON report with `--json`.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use batchfield_compute::{HashCostModel, JobScheduler};
use batchfield_core::config::load_dotenv;
use batchfield_core::{
    Contribution, DurationPolicy, Job, PartitionPolicy, Position, SchedulerConfig,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Cost-aware batch scheduler with a shared accumulator field.
#[derive(Parser, Debug)]
#[command(name = "batchfield", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "BATCHFIELD_CONFIG")]
    config: Option<String>,

    /// Number of workers (overrides the config).
    #[arg(long)]
    workers: Option<usize>,

    /// Number of batches per cycle (defaults to one per worker).
    #[arg(long)]
    batches: Option<usize>,

    /// Number of jobs to generate.
    #[arg(long, env = "BATCHFIELD_JOBS", default_value_t = 100)]
    jobs: usize,

    /// Cycle deadline in milliseconds.
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Length of one simulated work unit in milliseconds.
    #[arg(long)]
    time_unit_ms: Option<u64>,

    /// Partition policy: `balanced` or `stride`.
    #[arg(long)]
    partition: Option<PartitionPolicy>,

    /// Duration policy: `inverse_cost` or `proportional_cost`.
    #[arg(long)]
    duration_policy: Option<DurationPolicy>,

    /// Salt mixed into the hash cost model.
    #[arg(long, env = "BATCHFIELD_SALT", default_value = "")]
    salt: String,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// CLI flags win over file and env values.
    fn apply(&self, config: &mut SchedulerConfig) {
        if let Some(n) = self.workers {
            config.worker_count = n;
        }
        if let Some(n) = self.batches {
            config.target_batches = Some(n);
        }
        if let Some(ms) = self.deadline_ms {
            config.deadline_ms = Some(ms);
        }
        if let Some(ms) = self.time_unit_ms {
            config.time_unit_ms = ms;
        }
        if let Some(p) = self.partition {
            config.partition = p;
        }
        if let Some(p) = self.duration_policy {
            config.duration_policy = p;
        }
    }
}

/// File (or defaults) plus env overrides, then CLI flags, then one validation.
/// Invalid values are fatal; only a missing file falls back to defaults.
fn load_config(cli: &Cli) -> anyhow::Result<SchedulerConfig> {
    let mut config = SchedulerConfig::load_layered(cli.config.as_deref().map(Path::new))?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    config.log_summary();

    let model = HashCostModel::new()
        .with_salt(cli.salt.clone())
        .scatter_into(config.grid_shape, 1.0)?;
    let scheduler = JobScheduler::new(config, Arc::new(model))?;

    // Seed value at the origin, so the final reading shows accumulation on top.
    scheduler
        .field()
        .accumulate(Contribution::new(Position::ORIGIN, 1.5))?;

    let jobs: Vec<Job> = (0..cli.jobs).map(|i| Job::new(format!("job-{i}"))).collect();
    let report = scheduler.schedule(&jobs)?;

    if cli.json {
        let out = serde_json::json!({
            "config": scheduler.config().summary(),
            "report": report,
            "metrics": scheduler.metrics(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for result in report.sorted_results() {
        println!("{result}");
    }
    println!(
        "{} jobs: {} completed, {} timed out, {} failed in {:.3}s",
        report.results.len(),
        report.completed,
        report.timed_out,
        report.failed,
        report.elapsed.as_secs_f64()
    );
    println!(
        "field at {}: {:.4} (total {:.4})",
        Position::ORIGIN,
        scheduler.query(Position::ORIGIN)?,
        scheduler.field().snapshot_total()?
    );
    Ok(())
}
