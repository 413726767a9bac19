//! Storage collaborators for the OEE engine
//!
//! The engine only reads tags, samples, and job metadata, and writes whole
//! series back. Those seams are traits so the engine runs against any
//! backend:
//! - `InMemoryStore`: all three roles in memory, for tests and CSV replay
//! - `SledSeriesStore`: durable series persistence with atomic replace
//! - `TagCache`: metadata-only cache of tag lookups shared across runs

mod memory;
mod series;
mod tag_cache;

pub use memory::InMemoryStore;
pub use series::{SeriesStoreStats, SledSeriesStore, StoredSeries};
pub use tag_cache::{TagCache, TagCacheStats};

use chrono::{DateTime, Utc};

use crate::types::{Job, JobId, SeriesReport, Tag, TagId, TagRef, TagSample, TaggableType};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Read access to tag metadata and the append-only tag value log
///
/// Implementations must be thread-safe (Send + Sync); one store is shared
/// by every computation in the process.
pub trait TagValueStore: Send + Sync {
    /// Look up a tag by the entity it is attached to and its reference
    fn get_tag(
        &self,
        taggable_type: TaggableType,
        taggable_id: u64,
        tag_ref: TagRef,
    ) -> Result<Option<Tag>, StoreError>;

    /// Samples with `from <= created_at <= to`, ordered by `created_at`
    fn get_samples(
        &self,
        tag_id: TagId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TagSample>, StoreError>;

    fn first_sample_at_or_after(
        &self,
        tag_id: TagId,
        t: DateTime<Utc>,
    ) -> Result<Option<TagSample>, StoreError>;

    fn last_sample_at_or_before(
        &self,
        tag_id: TagId,
        t: DateTime<Utc>,
    ) -> Result<Option<TagSample>, StoreError>;
}

/// Job metadata owned by the lifecycle manager
pub trait JobCatalog: Send + Sync {
    fn get_job(&self, job_id: JobId) -> Result<Option<Job>, StoreError>;

    /// Containers per pack for the SKU
    fn sku_pack_multiplier(&self, sku_id: u64) -> Result<f64, StoreError>;

    /// Design speed for the job's SKU on `line_id`, units per hour.
    ///
    /// Returns 0 when it cannot be resolved; the engine treats 0 as invalid.
    fn design_speed(&self, job: &Job, line_id: u64) -> f64;
}

/// Destination for computed series
pub trait SeriesSink: Send + Sync {
    /// Atomically replace the stored series of `report.job_id` with the
    /// report's snapshots, grid length, and skip summary
    fn replace_series(&self, report: &SeriesReport) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
