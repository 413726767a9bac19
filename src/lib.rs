//! OEE Engine: Overall Equipment Effectiveness time series for production jobs
//!
//! Reconstructs, for every tick of a job's sampling grid, the cumulative OEE
//! metric chain from raw tag samples: a cumulative production counter, an
//! optional reject counter, and a machine-state code signal.
//!
//! ## Architecture
//!
//! - **Types**: tags, samples, jobs, state runs, snapshots, series reports
//! - **Engine**: sequence extraction, duration aggregation, counter and loss
//!   reconstruction, the metric chain, and the orchestrator
//! - **Storage**: collaborator traits, in-memory store, sled series store,
//!   tag metadata cache
//! - **Acquisition**: CSV samples and TOML fixtures for offline replay
//! - **Config**: TOML engine configuration

pub mod acquisition;
pub mod config;
pub mod engine;
pub mod storage;
pub mod types;

// Re-export engine configuration
pub use config::EngineConfig;

// Re-export the orchestrator surface
pub use engine::{ComputeRequest, EngineError, TimeSeriesOrchestrator};

// Re-export storage
pub use storage::{
    InMemoryStore, JobCatalog, SeriesSink, SledSeriesStore, StoreError, TagCache, TagValueStore,
};

// Re-export commonly used types
pub use types::{
    CounterKind, Job, LossTracking, MachineState, MetricSnapshot, SeriesReport, SkipReason,
    SkipSummary, StateCode, StateRun, Tag, TagRef, TagSample, TaggableType,
};
