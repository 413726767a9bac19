//! OEE time-series engine
//!
//! - `sequence`: machine-state samples to contiguous state runs
//! - `duration`: time spent in a set of states, clipped to a window
//! - `counter`: net production per tick from a cumulative counter
//! - `loss`: rejected units since job start
//! - `metrics`: the VOT → OEE metric chain for one tick
//! - `grid`: sampling ticks and the interval policy for long jobs
//! - `orchestrator`: phases, batching, cancellation, persistence hand-off

pub mod counter;
pub mod duration;
pub mod error;
pub mod grid;
pub mod loss;
pub mod metrics;
pub mod orchestrator;
pub mod sequence;

pub use counter::{CounterAnchors, CounterReconstructor};
pub use duration::{total_minutes_in, DurationIndex, StateSet};
pub use error::EngineError;
pub use grid::{GridPolicy, SamplingGrid};
pub use loss::LossCalculator;
pub use metrics::{evaluate, MetricInputs};
pub use orchestrator::{
    assemble, ComputeRequest, OrchestratorSettings, Phase, TickEvaluator, TimeSeriesOrchestrator,
};
pub use sequence::{extract_runs, extract_runs_seeded};
