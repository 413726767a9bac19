//! oee-engine - OEE time series for production jobs
//!
//! Replays a recorded line through the engine and stores the resulting
//! series.
//!
//! # Usage
//!
//! ```bash
//! # Generate a synthetic line
//! cargo run --bin simulation -- --out-dir data/sim
//!
//! # Compute and persist the series of the fixture's job
//! oee-engine compute --fixture data/sim/fixture.toml --samples data/sim/samples.csv
//!
//! # Compute without persisting, five-minute grid
//! oee-engine compute --fixture f.toml --samples s.csv --interval-minutes 5 --dry-run
//!
//! # Print a stored series
//! oee-engine show --job 1
//! ```
//!
//! # Environment Variables
//!
//! - `OEE_CONFIG`: Path to the engine config TOML (default: ./oee_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use oee_engine::acquisition::{load_samples, LineFixture};
use oee_engine::config::{self, EngineConfig};
use oee_engine::storage::{JobCatalog, SledSeriesStore, TagValueStore};
use oee_engine::types::{MetricSnapshot, SeriesReport};
use oee_engine::{ComputeRequest, TimeSeriesOrchestrator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "oee-engine")]
#[command(about = "OEE time-series computation engine")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Compute the OEE series of the job described by a fixture
    Compute {
        /// Line fixture TOML (job, design speed, tags)
        #[arg(long)]
        fixture: PathBuf,
        /// Tag samples CSV (tag_id,value,created_at)
        #[arg(long)]
        samples: PathBuf,
        /// Grid interval in minutes (default: [grid] policy from config)
        #[arg(long)]
        interval_minutes: Option<u32>,
        /// Window end for an open job, RFC 3339 (default: now)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
        /// Series database path (default: [storage] series_db_path)
        #[arg(long, env = "OEE_SERIES_DB")]
        db: Option<PathBuf>,
        /// Compute only, do not persist
        #[arg(long)]
        dry_run: bool,
        /// Print the full report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Print a stored series
    Show {
        /// Job id
        #[arg(long)]
        job: u64,
        /// Series database path (default: [storage] series_db_path)
        #[arg(long, env = "OEE_SERIES_DB")]
        db: Option<PathBuf>,
    },
}

// ============================================================================
// Commands
// ============================================================================

struct ComputeArgs {
    fixture: PathBuf,
    samples: PathBuf,
    interval_minutes: Option<u32>,
    as_of: Option<DateTime<Utc>>,
    db: Option<PathBuf>,
    dry_run: bool,
    json: bool,
}

async fn run_compute(args: ComputeArgs) -> Result<()> {
    let fixture = LineFixture::load(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;
    let load = load_samples(&args.samples)
        .with_context(|| format!("Failed to load samples {}", args.samples.display()))?;
    if load.malformed_rows > 0 {
        warn!(malformed = load.malformed_rows, "Some sample rows were skipped");
    }

    let job_id = fixture.job.id;
    let store = Arc::new(fixture.into_store(load.samples).context("Failed to build store")?);
    let tags: Arc<dyn TagValueStore> = store.clone();
    let catalog: Arc<dyn JobCatalog> = store;

    let engine_config = config::get();
    let orchestrator = TimeSeriesOrchestrator::from_config(tags, catalog, engine_config);

    let mut request = ComputeRequest::new(job_id);
    if let Some(minutes) = args.interval_minutes {
        request = request.with_interval(Duration::minutes(i64::from(minutes)));
    }
    if let Some(as_of) = args.as_of {
        request = request.with_as_of(as_of);
    }

    // Graceful cancellation via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, cancelling computation...");
        shutdown_token.cancel();
    });

    let db_path = args
        .db
        .unwrap_or_else(|| PathBuf::from(&engine_config.storage.series_db_path));
    let dry_run = args.dry_run;

    let report = tokio::task::spawn_blocking(move || -> Result<SeriesReport> {
        if dry_run {
            return Ok(orchestrator.compute(&request, &cancel_token)?);
        }
        let sink = SledSeriesStore::open(&db_path)
            .with_context(|| format!("Failed to open series store {}", db_path.display()))?;
        Ok(orchestrator.recompute_and_persist(&request, &cancel_token, &sink)?)
    })
    .await
    .context("Computation task panicked")??;

    print_summary(&report);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn run_show(job_id: u64, db: Option<PathBuf>) -> Result<()> {
    let db_path = db.unwrap_or_else(|| PathBuf::from(&config::get().storage.series_db_path));
    let store = SledSeriesStore::open(&db_path)
        .with_context(|| format!("Failed to open series store {}", db_path.display()))?;

    let Some(stored) = store.get_series(job_id)? else {
        anyhow::bail!("No stored series for job {job_id} in {}", db_path.display());
    };

    println!("job {} | stored {} | {} snapshots", stored.job_id, stored.stored_at, stored.snapshots.len());
    if stored.is_partial() {
        println!(
            "partial series: {} of {} ticks skipped",
            stored.skipped.total, stored.grid_len
        );
        for (reason, count) in &stored.skipped.by_reason {
            println!("  - {reason}: {count}");
        }
    }
    println!(
        "{:<25} {:>12} {:>8} {:>9} {:>9} {:>9} {:>9}",
        "timestamp", "net_units", "lost", "avail%", "perf%", "qual%", "oee%"
    );
    for s in &stored.snapshots {
        print_row(s);
    }
    Ok(())
}

fn print_row(s: &MetricSnapshot) {
    println!(
        "{:<25} {:>12.0} {:>8.0} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
        s.timestamp.to_rfc3339(),
        s.net_production_units,
        s.lost_units,
        s.availability,
        s.performance,
        s.quality,
        s.oee
    );
}

fn print_summary(report: &SeriesReport) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Job {} ({} counter)", report.job_id, report.counter_kind);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Grid ticks:      {} every {}s", report.grid_len, report.interval_secs);
    info!("   Valid ticks:     {}", report.valid_ticks());
    info!("   Skipped ticks:   {}", report.skipped.total);
    for (reason, count) in &report.skipped.by_reason {
        info!("     - {reason}: {count}");
    }
    info!("   Loss tracking:   {}", report.loss_tracking);
    match report.final_snapshot() {
        Some(s) => info!(
            "   Final OEE:       {:.2}% (A {:.2}% x P {:.2}% x Q {:.2}%)",
            s.oee, s.availability, s.performance, s.quality
        ),
        None => info!("   Final OEE:       n/a"),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let engine_config = EngineConfig::load();
    for w in config::validation::check_operating_ranges(&engine_config) {
        warn!("{}", w);
    }
    info!(
        interval_minutes = engine_config.grid.interval_minutes,
        max_ticks = engine_config.grid.max_ticks,
        batch_size = engine_config.evaluation.batch_size,
        "Engine configuration loaded"
    );
    config::init(engine_config);

    match args.command {
        SubCommand::Compute {
            fixture,
            samples,
            interval_minutes,
            as_of,
            db,
            dry_run,
            json,
        } => {
            run_compute(ComputeArgs {
                fixture,
                samples,
                interval_minutes,
                as_of,
                db,
                dry_run,
                json,
            })
            .await
        }
        SubCommand::Show { job, db } => run_show(job, db),
    }
}
