//! Time-Series Orchestrator
//!
//! Drives one job through the computation phases:
//!
//! ```text
//! Initializing → ResolvingInputs → BuildingGrid → EvaluatingTicks → Assembling → Done
//!        └──────────────┴───────────────┴──────────────┴──────────────┴──→ Failed
//! ```
//!
//! All store reads happen in `Initializing` and `ResolvingInputs`. After that
//! every tick reads only the prefetched, immutable inputs held by a
//! [`TickEvaluator`], so ticks of one batch are evaluated in parallel with
//! rayon while batches run in order. The cancellation token is checked
//! before each batch.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::counter::{CounterAnchors, CounterReconstructor};
use super::duration::{DurationIndex, StateSet};
use super::error::EngineError;
use super::grid::{GridPolicy, SamplingGrid};
use super::loss::LossCalculator;
use super::metrics::{self, MetricInputs};
use super::sequence::extract_runs_seeded;
use crate::config::EngineConfig;
use crate::storage::{JobCatalog, SeriesSink, TagCache, TagValueStore};
use crate::types::{
    minutes_between, CounterKind, Job, JobId, MetricSnapshot, SeriesReport, SkipSummary,
    StateCode, Tag, TagRef, TickOutcome, TickSkip,
};

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    ResolvingInputs,
    BuildingGrid,
    EvaluatingTicks,
    Assembling,
    Done,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Initializing => "initializing",
            Phase::ResolvingInputs => "resolving_inputs",
            Phase::BuildingGrid => "building_grid",
            Phase::EvaluatingTicks => "evaluating_ticks",
            Phase::Assembling => "assembling",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current phase of one computation, logged on every transition
struct PhaseTracker {
    job_id: JobId,
    phase: Phase,
    started: Instant,
}

impl PhaseTracker {
    fn new(job_id: JobId) -> Self {
        debug!(job_id, phase = %Phase::Initializing, "OEE computation started");
        Self {
            job_id,
            phase: Phase::Initializing,
            started: Instant::now(),
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!(
            job_id = self.job_id,
            from = %self.phase,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Phase transition"
        );
        self.phase = next;
    }

    fn fail(&mut self, err: &EngineError) {
        if err.is_cancelled() {
            info!(job_id = self.job_id, phase = %self.phase, "OEE computation cancelled");
        } else {
            warn!(job_id = self.job_id, phase = %self.phase, error = %err, "OEE computation failed");
        }
        self.phase = Phase::Failed;
    }
}

// ============================================================================
// Request & Settings
// ============================================================================

/// One request to compute the series of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeRequest {
    pub job_id: JobId,
    /// Grid interval; `None` applies the configured [`GridPolicy`]
    pub interval: Option<Duration>,
    /// Window end for open jobs; `None` means now
    pub as_of: Option<DateTime<Utc>>,
}

impl ComputeRequest {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            interval: None,
            as_of: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }
}

/// Orchestrator settings derived from [`EngineConfig`]
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub grid: GridPolicy,
    pub batch_size: usize,
    pub allow_open_jobs: bool,
    pub unplanned_down: StateSet,
    pub tailback: StateSet,
    pub lack: StateSet,
}

impl OrchestratorSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            grid: config.grid,
            batch_size: config.evaluation.batch_size.max(1),
            allow_open_jobs: config.evaluation.allow_open_jobs,
            unplanned_down: config.states.unplanned_down_set(),
            tailback: config.states.tailback_set(),
            lack: config.states.lack_set(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

// ============================================================================
// Tick Evaluation
// ============================================================================

/// Immutable per-job inputs for evaluating any tick of the grid.
///
/// Holds no cursor; every lookup is a binary search, so one evaluator is
/// shared by all worker threads.
#[derive(Debug, Clone)]
pub struct TickEvaluator {
    pub counter: CounterReconstructor,
    pub loss: LossCalculator,
    pub udt: DurationIndex,
    pub tailback: DurationIndex,
    pub lack: DurationIndex,
    pub job_start: DateTime<Utc>,
    /// Units per hour
    pub design_speed: f64,
}

impl TickEvaluator {
    /// Evaluate the cumulative window `[job_start, tick]`.
    pub fn evaluate_tick(&self, tick: DateTime<Utc>) -> TickOutcome {
        let inputs = MetricInputs {
            net_production: self.counter.net_production_at(tick),
            lost_units: self.loss.lost_units_at(tick),
            design_speed: self.design_speed,
            window_minutes: minutes_between(self.job_start, tick),
            udt_minutes: self.udt.minutes_until(tick),
            tailback_minutes: self.tailback.minutes_until(tick),
            lack_minutes: self.lack.minutes_until(tick),
        };

        match metrics::evaluate(tick, &inputs) {
            Ok(snapshot) => TickOutcome::Valid(snapshot),
            Err(reason) => TickOutcome::Skipped(TickSkip {
                timestamp: tick,
                reason,
            }),
        }
    }
}

/// Restore timestamp order and split outcomes into the valid series and
/// the skip summary.
pub fn assemble(mut outcomes: Vec<TickOutcome>) -> (Vec<MetricSnapshot>, SkipSummary) {
    outcomes.sort_by_key(TickOutcome::timestamp);

    let mut snapshots = Vec::with_capacity(outcomes.len());
    let mut skipped = SkipSummary::default();
    for outcome in outcomes {
        match outcome {
            TickOutcome::Valid(snapshot) => {
                if snapshots
                    .last()
                    .is_some_and(|prev: &MetricSnapshot| prev.timestamp == snapshot.timestamp)
                {
                    continue;
                }
                snapshots.push(snapshot);
            }
            TickOutcome::Skipped(skip) => skipped.record(&skip),
        }
    }

    (snapshots, skipped)
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Inputs resolved from the stores for one job
struct ResolvedInputs {
    job: Job,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    evaluator: TickEvaluator,
}

/// Computes OEE time series for jobs against the injected collaborators
pub struct TimeSeriesOrchestrator {
    tags: Arc<dyn TagValueStore>,
    catalog: Arc<dyn JobCatalog>,
    tag_cache: Arc<TagCache>,
    settings: OrchestratorSettings,
}

impl TimeSeriesOrchestrator {
    pub fn new(
        tags: Arc<dyn TagValueStore>,
        catalog: Arc<dyn JobCatalog>,
        tag_cache: Arc<TagCache>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            tags,
            catalog,
            tag_cache,
            settings,
        }
    }

    /// Build from a config, with a fresh tag cache sized by `[cache]`.
    pub fn from_config(
        tags: Arc<dyn TagValueStore>,
        catalog: Arc<dyn JobCatalog>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(
            tags,
            catalog,
            Arc::new(TagCache::new(config.cache.tag_cache_capacity)),
            OrchestratorSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn tag_cache(&self) -> &Arc<TagCache> {
        &self.tag_cache
    }

    /// Compute the series for one job.
    ///
    /// Fatal conditions return [`EngineError`]; per-tick problems are
    /// reported in [`SeriesReport::skipped`].
    pub fn compute(
        &self,
        request: &ComputeRequest,
        cancel: &CancellationToken,
    ) -> Result<SeriesReport, EngineError> {
        let mut phase = PhaseTracker::new(request.job_id);
        match self.run(request, cancel, &mut phase) {
            Ok(report) => {
                phase.enter(Phase::Done);
                Ok(report)
            }
            Err(e) => {
                phase.fail(&e);
                Err(e)
            }
        }
    }

    /// Compute the series and atomically replace the stored one.
    ///
    /// Nothing is written when the computation fails, is cancelled, or
    /// yields no valid tick at all. A series with some skipped ticks is
    /// stored together with its skip summary.
    pub fn recompute_and_persist(
        &self,
        request: &ComputeRequest,
        cancel: &CancellationToken,
        sink: &dyn SeriesSink,
    ) -> Result<SeriesReport, EngineError> {
        let job_id = request.job_id;
        let report = self.compute(request, cancel)?;
        if cancel.is_cancelled() {
            info!(job_id, "Cancelled after evaluation, series not persisted");
            return Err(EngineError::Cancelled { job_id });
        }
        if report.valid_ticks() == 0 {
            warn!(
                job_id,
                grid_len = report.grid_len,
                skipped = report.skipped.total,
                "No valid ticks, series not persisted"
            );
            return Err(EngineError::NoValidTicks {
                job_id,
                grid_len: report.grid_len,
            });
        }

        sink.replace_series(&report)
            .map_err(EngineError::store(job_id))?;

        info!(
            job_id,
            backend = sink.backend_name(),
            snapshots = report.snapshots.len(),
            skipped = report.skipped.total,
            "Series persisted"
        );
        Ok(report)
    }

    fn run(
        &self,
        request: &ComputeRequest,
        cancel: &CancellationToken,
        phase: &mut PhaseTracker,
    ) -> Result<SeriesReport, EngineError> {
        let job_id = request.job_id;

        let resolved = self.resolve(request, phase)?;
        let ResolvedInputs {
            job,
            start,
            end,
            evaluator,
        } = resolved;

        // === Grid ===
        phase.enter(Phase::BuildingGrid);
        let interval = request
            .interval
            .unwrap_or_else(|| self.settings.grid.interval_for(start, end));
        let grid = SamplingGrid::build(start, end, interval).ok_or(EngineError::InvalidInterval {
            job_id,
            interval_secs: interval.num_seconds(),
        })?;
        debug!(
            job_id,
            ticks = grid.len(),
            interval_secs = interval.num_seconds(),
            "Sampling grid built"
        );

        // === Evaluation ===
        phase.enter(Phase::EvaluatingTicks);
        let mut outcomes = Vec::with_capacity(grid.len());
        for batch in grid.batches(self.settings.batch_size) {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled { job_id });
            }
            let mut evaluated: Vec<TickOutcome> = batch
                .par_iter()
                .map(|tick| evaluator.evaluate_tick(*tick))
                .collect();
            outcomes.append(&mut evaluated);
        }

        // === Assembly ===
        phase.enter(Phase::Assembling);
        let (snapshots, skipped) = assemble(outcomes);

        if let Some((reason, count)) = skipped.primary_reason() {
            warn!(
                job_id,
                skipped = skipped.total,
                valid = snapshots.len(),
                primary_reason = %reason,
                primary_count = count,
                "Ticks dropped from series"
            );
        }

        info!(
            job_id,
            line_id = job.line_id,
            counter = %evaluator.counter.kind(),
            ticks = grid.len(),
            valid = snapshots.len(),
            loss_tracking = %evaluator.loss.tracking(),
            final_oee = snapshots.last().map(|s| s.oee),
            "OEE series computed"
        );

        Ok(SeriesReport {
            job_id,
            counter_kind: evaluator.counter.kind(),
            design_speed: evaluator.design_speed,
            interval_secs: interval.num_seconds(),
            grid_len: grid.len(),
            snapshots,
            skipped,
            loss_tracking: evaluator.loss.tracking(),
        })
    }

    /// Initializing and ResolvingInputs: every store read of the computation
    fn resolve(
        &self,
        request: &ComputeRequest,
        phase: &mut PhaseTracker,
    ) -> Result<ResolvedInputs, EngineError> {
        let job_id = request.job_id;
        let store_err = || EngineError::store(job_id);

        // === Job ===
        let job = self
            .catalog
            .get_job(job_id)
            .map_err(store_err())?
            .ok_or(EngineError::JobNotFound { job_id })?;

        if !job.is_closed() && !self.settings.allow_open_jobs {
            return Err(EngineError::JobNotClosed { job_id });
        }
        let (start, end) = job.window(request.as_of.unwrap_or_else(Utc::now));
        if end < start {
            return Err(EngineError::InvalidWindow { job_id, start, end });
        }

        let design_speed = self.catalog.design_speed(&job, job.line_id);
        if design_speed.is_nan() || design_speed <= 0.0 {
            warn!(job_id, design_speed, "Design speed unresolved, every tick will be dropped");
        }

        // === Tags ===
        phase.enter(Phase::ResolvingInputs);
        let (production_tag, kind) = self.resolve_production_tag(&job)?;

        let containers_per_pack = match kind {
            CounterKind::CaseCount => self
                .catalog
                .sku_pack_multiplier(job.sku_id)
                .map_err(store_err())?,
            CounterKind::BottleCount => 1.0,
        };

        let state_tag = self
            .resolve_tag(&job, TagRef::MachineState)?
            .ok_or(EngineError::NoMachineStateTag {
                job_id,
                line_id: job.line_id,
                machine_id: job.machine_id,
            })?;
        let reject_tag = self.resolve_tag(&job, TagRef::RejectCount)?;

        // === Production counter ===
        let production_samples = self
            .tags
            .get_samples(production_tag.id, start, end)
            .map_err(store_err())?;
        if production_samples.is_empty() {
            return Err(EngineError::NoSamplesInWindow {
                job_id,
                tag_id: production_tag.id,
            });
        }
        let virtual_zero = self
            .tags
            .first_sample_at_or_after(production_tag.id, start)
            .map_err(store_err())?
            .ok_or(EngineError::NoVirtualZero { job_id })?;
        let end_anchor = self
            .tags
            .last_sample_at_or_before(production_tag.id, end)
            .map_err(store_err())?
            .ok_or(EngineError::NoEndAnchor { job_id })?;

        let counter = CounterReconstructor::new(
            production_samples,
            CounterAnchors {
                virtual_zero: virtual_zero.value,
                end_value: end_anchor.value,
            },
            end,
            kind,
            containers_per_pack,
        );

        // === Machine state ===
        let state_samples = self
            .tags
            .get_samples(state_tag.id, start, end)
            .map_err(store_err())?;
        let prior_state = self
            .tags
            .last_sample_at_or_before(state_tag.id, start)
            .map_err(store_err())?
            .map(|s| StateCode::from_sample_value(s.value));
        if state_samples.is_empty() {
            warn!(
                job_id,
                state_tag = state_tag.id,
                prior_state = prior_state.map(|s| s.0),
                "No machine-state samples in job window, state durations will be zero"
            );
        }
        let runs = extract_runs_seeded(prior_state, start, &state_samples);

        // === Rejects ===
        let loss = match reject_tag {
            Some(tag) => {
                let baseline = self
                    .tags
                    .last_sample_at_or_before(tag.id, start)
                    .map_err(store_err())?;
                let window = self
                    .tags
                    .get_samples(tag.id, start, end)
                    .map_err(store_err())?;
                LossCalculator::new(baseline.as_ref(), window, start)
            }
            None => LossCalculator::not_configured(),
        };
        if !loss.tracking().is_tracked() {
            debug!(job_id, loss_tracking = %loss.tracking(), "Reject losses not tracked");
        }

        debug!(
            job_id,
            counter = %kind,
            production_samples = counter.sample_count(),
            state_samples = state_samples.len(),
            state_runs = runs.len(),
            "Inputs resolved"
        );

        let evaluator = TickEvaluator {
            counter,
            loss,
            udt: DurationIndex::build(&runs, &self.settings.unplanned_down, start),
            tailback: DurationIndex::build(&runs, &self.settings.tailback, start),
            lack: DurationIndex::build(&runs, &self.settings.lack, start),
            job_start: start,
            design_speed,
        };

        Ok(ResolvedInputs {
            job,
            start,
            end,
            evaluator,
        })
    }

    /// CASE_COUNT first, BOTTLE_COUNT as fallback
    fn resolve_production_tag(&self, job: &Job) -> Result<(Tag, CounterKind), EngineError> {
        if let Some(tag) = self.resolve_tag(job, TagRef::CaseCount)? {
            return Ok((tag, CounterKind::CaseCount));
        }
        if let Some(tag) = self.resolve_tag(job, TagRef::BottleCount)? {
            return Ok((tag, CounterKind::BottleCount));
        }
        Err(EngineError::NoProductionTag {
            job_id: job.id,
            line_id: job.line_id,
            machine_id: job.machine_id,
        })
    }

    fn resolve_tag(&self, job: &Job, tag_ref: TagRef) -> Result<Option<Tag>, EngineError> {
        self.tag_cache
            .resolve_for_machine_or_line(self.tags.as_ref(), job.machine_id, job.line_id, tag_ref)
            .map_err(EngineError::store(job.id))
    }
}
