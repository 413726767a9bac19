//! Job-level (fatal) errors
//!
//! Per-tick problems are not errors; they surface as
//! [`SkipReason`](crate::types::SkipReason) values in the series report.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StoreError;
use crate::types::{JobId, TagId};

/// A condition that aborts the whole computation for a job.
///
/// No partial series is ever returned or persisted alongside one of these.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job {job_id}: job not found")]
    JobNotFound { job_id: JobId },

    #[error("job {job_id}: job is still open and open jobs are not allowed")]
    JobNotClosed { job_id: JobId },

    #[error("job {job_id}: job window is inverted ({start} > {end})")]
    InvalidWindow {
        job_id: JobId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("job {job_id}: sampling interval must be positive, got {interval_secs}s")]
    InvalidInterval { job_id: JobId, interval_secs: i64 },

    #[error(
        "job {job_id}: no production counter tag (CASE_COUNT or BOTTLE_COUNT) on machine {machine_id} or line {line_id}"
    )]
    NoProductionTag {
        job_id: JobId,
        line_id: u64,
        machine_id: u64,
    },

    #[error("job {job_id}: no MACHINE_STATE tag on machine {machine_id} or line {line_id}")]
    NoMachineStateTag {
        job_id: JobId,
        line_id: u64,
        machine_id: u64,
    },

    #[error("job {job_id}: production counter tag {tag_id} has no samples in the job window")]
    NoSamplesInWindow { job_id: JobId, tag_id: TagId },

    #[error("job {job_id}: no production counter sample at or after job start (virtual zero)")]
    NoVirtualZero { job_id: JobId },

    #[error("job {job_id}: no production counter sample at or before job end")]
    NoEndAnchor { job_id: JobId },

    #[error("job {job_id}: computation cancelled")]
    Cancelled { job_id: JobId },

    #[error("job {job_id}: none of the {grid_len} ticks produced a valid snapshot, stored series left unchanged")]
    NoValidTicks { job_id: JobId, grid_len: usize },

    #[error("job {job_id}: store error: {source}")]
    Store {
        job_id: JobId,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    pub fn job_id(&self) -> JobId {
        match self {
            EngineError::JobNotFound { job_id }
            | EngineError::JobNotClosed { job_id }
            | EngineError::InvalidWindow { job_id, .. }
            | EngineError::InvalidInterval { job_id, .. }
            | EngineError::NoProductionTag { job_id, .. }
            | EngineError::NoMachineStateTag { job_id, .. }
            | EngineError::NoSamplesInWindow { job_id, .. }
            | EngineError::NoVirtualZero { job_id }
            | EngineError::NoEndAnchor { job_id }
            | EngineError::Cancelled { job_id }
            | EngineError::NoValidTicks { job_id, .. }
            | EngineError::Store { job_id, .. } => *job_id,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled { .. })
    }

    /// Wrap a store error for `job_id`; use with `map_err`.
    pub(crate) fn store(job_id: JobId) -> impl FnOnce(StoreError) -> Self {
        move |source| EngineError::Store { job_id, source }
    }
}
