//! Bottling Line Simulation
//!
//! Generates a synthetic production job for replay through oee-engine.
//! Simulates a shift on one line including:
//! - Normal operation with speed jitter and short stops
//! - Outfeed tailback and infeed lack
//! - An equipment failure
//! - Optionally, a production counter reset near the end of the job
//!
//! Writes `fixture.toml` (job, design speed, tags) and `samples.csv`
//! (tag_id,value,created_at) to the output directory.
//!
//! # Usage
//! ```bash
//! ./simulation --hours 8 --seed 42 --out-dir data/sim
//! ./oee-engine compute --fixture data/sim/fixture.toml --samples data/sim/samples.csv
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::prelude::*;

use oee_engine::acquisition::{write_samples, LineFixture};
use oee_engine::types::{Job, MachineState, Tag, TagRef, TagSample, TaggableType};

// ============================================================================
// Line Constants
// ============================================================================

const JOB_ID: u64 = 1;
const LINE_ID: u64 = 10;
const MACHINE_ID: u64 = 3;
const SKU_ID: u64 = 7;

const PRODUCTION_TAG: u64 = 1;
const REJECT_TAG: u64 = 2;
const STATE_TAG: u64 = 3;

/// Seconds between counter samples
const COUNTER_PERIOD_SECS: i64 = 30;
/// State heartbeat even when the state does not change (seconds)
const STATE_HEARTBEAT_SECS: i64 = 300;
/// Fraction of output rejected while operating
const REJECT_RATE: f64 = 0.004;
/// Probability per counter period of a short stop starting
const SHORT_STOP_PROBABILITY: f64 = 0.01;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "line-simulation")]
#[command(about = "Synthetic bottling line data for oee-engine replay")]
#[command(version = "1.0")]
struct Args {
    /// Job duration in hours (1-72)
    #[arg(short = 'H', long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=72))]
    hours: u32,

    /// Job start, RFC 3339
    #[arg(long, default_value = "2024-03-01T06:00:00Z")]
    start: DateTime<Utc>,

    /// Design speed, bottles per hour
    #[arg(long, default_value = "6000")]
    design_speed: f64,

    /// Containers per pack (used with the case counter)
    #[arg(long, default_value = "24")]
    pack: f64,

    /// Count bottles directly instead of cases
    #[arg(long)]
    bottle_count: bool,

    /// Omit the reject counter tag
    #[arg(long)]
    no_rejects: bool,

    /// Reset the production counter at 90% of the job
    #[arg(long)]
    counter_reset: bool,

    /// Output directory
    #[arg(short, long, default_value = "data/sim")]
    out_dir: PathBuf,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the run log
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Simulation Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Normal operation with short stops (0-30%)
    Running,
    /// Outfeed blocked (30-38%)
    Tailback,
    /// Back to normal (38-55%)
    Recovery,
    /// Equipment failure (55-60%)
    Failure,
    /// Normal operation (60-75%)
    Steady,
    /// Infeed starved (75-80%)
    Lack,
    /// Normal operation to job end (80-100%)
    Finish,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Running => "Running (short stops)",
            Phase::Tailback => "Tailback (outfeed blocked)",
            Phase::Recovery => "Recovery",
            Phase::Failure => "Equipment Failure",
            Phase::Steady => "Steady Operation",
            Phase::Lack => "Lack (infeed starved)",
            Phase::Finish => "Finish",
        }
    }

    fn from_progress(progress: f64) -> Self {
        match progress {
            p if p < 0.30 => Phase::Running,
            p if p < 0.38 => Phase::Tailback,
            p if p < 0.55 => Phase::Recovery,
            p if p < 0.60 => Phase::Failure,
            p if p < 0.75 => Phase::Steady,
            p if p < 0.80 => Phase::Lack,
            _ => Phase::Finish,
        }
    }

    /// Machine state while in this phase, before short stops
    fn machine_state(&self) -> MachineState {
        match self {
            Phase::Tailback => MachineState::Tailback,
            Phase::Failure => MachineState::EquipmentFailure,
            Phase::Lack => MachineState::Lack,
            _ => MachineState::Operating,
        }
    }
}

// ============================================================================
// Simulation State
// ============================================================================

struct LineSimulation {
    rng: StdRng,
    start: DateTime<Utc>,
    total_secs: i64,
    design_speed: f64,
    containers_per_pack: f64,
    counter_reset: bool,
    with_rejects: bool,

    /// Bottles produced this job, fractional
    bottles: f64,
    /// Production counter reading carried over from earlier jobs
    counter_offset: f64,
    reject_counter: f64,
    short_stop_left: i64,
    reset_done: bool,

    state: MachineState,
    last_state_sample: Option<DateTime<Utc>>,
    samples: Vec<TagSample>,
}

impl LineSimulation {
    fn new(args: &Args) -> Self {
        let mut rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let counter_offset = f64::from(rng.gen_range(10_000u32..200_000));
        let reject_counter = f64::from(rng.gen_range(100u32..5_000));

        Self {
            rng,
            start: args.start,
            total_secs: i64::from(args.hours) * 3600,
            design_speed: args.design_speed,
            containers_per_pack: if args.bottle_count { 1.0 } else { args.pack },
            counter_reset: args.counter_reset,
            with_rejects: !args.no_rejects,
            bottles: 0.0,
            counter_offset,
            reject_counter,
            short_stop_left: 0,
            reset_done: false,
            state: MachineState::Operating,
            last_state_sample: None,
            samples: Vec::new(),
        }
    }

    fn counter_value(&self) -> f64 {
        self.counter_offset + (self.bottles / self.containers_per_pack).floor()
    }

    /// Readings from the previous job, just before this job starts
    fn emit_prior_readings(&mut self) {
        let counter = self.counter_value();
        self.samples.push(TagSample::new(
            PRODUCTION_TAG,
            counter,
            self.start - Duration::minutes(2),
        ));
        if self.with_rejects {
            self.samples.push(TagSample::new(
                REJECT_TAG,
                self.reject_counter,
                self.start - Duration::minutes(1),
            ));
        }
        // Line was starting up when the job opened
        self.samples.push(TagSample::new(
            STATE_TAG,
            MachineState::Starting.code() as f64,
            self.start - Duration::minutes(5),
        ));
    }

    fn step(&mut self, elapsed_secs: i64) -> Phase {
        let now = self.start + Duration::seconds(elapsed_secs);
        let progress = elapsed_secs as f64 / self.total_secs as f64;
        let phase = Phase::from_progress(progress);

        let mut state = phase.machine_state();
        if state == MachineState::Operating {
            if self.short_stop_left > 0 {
                self.short_stop_left -= COUNTER_PERIOD_SECS;
                state = MachineState::Stopped;
            } else if self.rng.gen_bool(SHORT_STOP_PROBABILITY) {
                self.short_stop_left = self.rng.gen_range(1..=6) * COUNTER_PERIOD_SECS;
                state = MachineState::Stopped;
            }
        }

        let heartbeat_due = self
            .last_state_sample
            .map_or(true, |t| (now - t).num_seconds() >= STATE_HEARTBEAT_SECS);
        if state != self.state || heartbeat_due {
            self.samples
                .push(TagSample::new(STATE_TAG, state.code() as f64, now));
            self.state = state;
            self.last_state_sample = Some(now);
        }

        if state == MachineState::Operating && elapsed_secs > 0 {
            let efficiency = self.rng.gen_range(0.85..1.0);
            let produced = self.design_speed / 3600.0 * COUNTER_PERIOD_SECS as f64 * efficiency;
            self.bottles += produced;
            if self.with_rejects {
                let expected = produced * REJECT_RATE;
                let rejected = expected.floor() + f64::from(u8::from(self.rng.gen_bool(expected.fract())));
                self.reject_counter += rejected;
            }
        }

        if self.counter_reset && !self.reset_done && progress >= 0.9 {
            self.counter_offset = -(self.bottles / self.containers_per_pack).floor();
            self.reset_done = true;
        }

        self.samples
            .push(TagSample::new(PRODUCTION_TAG, self.counter_value(), now));
        if self.with_rejects {
            self.samples
                .push(TagSample::new(REJECT_TAG, self.reject_counter, now));
        }

        phase
    }

    fn fixture(&self) -> LineFixture {
        let production_ref = if self.containers_per_pack > 1.0 {
            TagRef::CaseCount
        } else {
            TagRef::BottleCount
        };

        let mut tags = vec![
            Tag {
                id: PRODUCTION_TAG,
                taggable_type: TaggableType::Machine,
                taggable_id: MACHINE_ID,
                tag_ref: production_ref,
            },
            Tag {
                id: STATE_TAG,
                taggable_type: TaggableType::Machine,
                taggable_id: MACHINE_ID,
                tag_ref: TagRef::MachineState,
            },
        ];
        if self.with_rejects {
            tags.push(Tag {
                id: REJECT_TAG,
                taggable_type: TaggableType::Line,
                taggable_id: LINE_ID,
                tag_ref: TagRef::RejectCount,
            });
        }

        LineFixture {
            design_speed: self.design_speed,
            containers_per_pack: self.containers_per_pack,
            job: Job {
                id: JOB_ID,
                line_id: LINE_ID,
                machine_id: MACHINE_ID,
                sku_id: SKU_ID,
                actual_start_time: self.start,
                actual_end_time: Some(self.start + Duration::seconds(self.total_secs)),
            },
            tags,
        }
    }
}

fn log_run(elapsed_secs: i64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!(
            "[{:02}:{:02}] {}",
            elapsed_secs / 3600,
            (elapsed_secs % 3600) / 60,
            message
        );
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut sim = LineSimulation::new(&args);

    log_run(0, &"=".repeat(60), args.quiet);
    log_run(0, "BOTTLING LINE SIMULATION", args.quiet);
    log_run(0, &"=".repeat(60), args.quiet);
    log_run(0, &format!("  Job start:      {}", args.start.to_rfc3339()), args.quiet);
    log_run(0, &format!("  Duration:       {} hours", args.hours), args.quiet);
    log_run(0, &format!("  Design speed:   {:.0} bottles/hr", args.design_speed), args.quiet);
    log_run(0, &format!("  Counter:        {}", if args.bottle_count { "bottles" } else { "cases" }), args.quiet);
    if let Some(seed) = args.seed {
        log_run(0, &format!("  Random seed:    {seed}"), args.quiet);
    }
    log_run(0, &"=".repeat(60), args.quiet);

    sim.emit_prior_readings();

    let mut current_phase = None;
    let mut elapsed = 0;
    while elapsed <= sim.total_secs {
        let phase = sim.step(elapsed);
        if current_phase != Some(phase) {
            log_run(elapsed, &format!(">>> PHASE: {}", phase.name()), args.quiet);
            current_phase = Some(phase);
        }
        elapsed += COUNTER_PERIOD_SECS;
    }

    std::fs::create_dir_all(&args.out_dir)?;
    let fixture_path = args.out_dir.join("fixture.toml");
    let samples_path = args.out_dir.join("samples.csv");

    std::fs::write(&fixture_path, sim.fixture().to_toml()?)?;
    sim.samples.sort_by_key(|s| (s.created_at, s.tag_id));
    write_samples(BufWriter::new(File::create(&samples_path)?), &sim.samples)?;

    log_run(sim.total_secs, &"=".repeat(60), args.quiet);
    log_run(sim.total_secs, "SIMULATION COMPLETE", args.quiet);
    log_run(sim.total_secs, &format!("Samples written: {}", sim.samples.len()), args.quiet);
    log_run(sim.total_secs, &format!("Bottles produced: {:.0}", sim.bottles), args.quiet);
    log_run(sim.total_secs, &format!("Fixture: {}", fixture_path.display()), args.quiet);
    log_run(sim.total_secs, &format!("Samples: {}", samples_path.display()), args.quiet);
    log_run(sim.total_secs, &"=".repeat(60), args.quiet);

    Ok(())
}
