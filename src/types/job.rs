//! Production job as supplied by the external lifecycle manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = u64;

/// A production job on a line, read-only to the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub line_id: u64,
    /// Bottleneck machine of the line for this job
    pub machine_id: u64,
    pub sku_id: u64,
    pub actual_start_time: DateTime<Utc>,
    /// `None` while the job is still running
    #[serde(default)]
    pub actual_end_time: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_closed(&self) -> bool {
        self.actual_end_time.is_some()
    }

    /// Job window `[start, end]`, using `as_of` as the end of an open job.
    pub fn window(&self, as_of: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.actual_start_time,
            self.actual_end_time.unwrap_or(as_of),
        )
    }
}

/// Semantics of the production counter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    /// Counts packs; net production is multiplied by containers per pack
    CaseCount,
    /// Counts containers directly
    BottleCount,
}

impl CounterKind {
    /// Multiplier converting counter units into base units (bottles)
    pub fn multiplier(&self, containers_per_pack: f64) -> f64 {
        match self {
            CounterKind::CaseCount => containers_per_pack,
            CounterKind::BottleCount => 1.0,
        }
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterKind::CaseCount => write!(f, "case-count"),
            CounterKind::BottleCount => write!(f, "bottle-count"),
        }
    }
}
