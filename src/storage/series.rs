//! Durable OEE series storage backed by sled
//!
//! One record per job: key = job id as big-endian bytes (sorts by id),
//! value = JSON-serialized [`StoredSeries`]. Replacing a series is a single
//! insert, so readers see either the previous series or the new one, never
//! a mix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::{SeriesSink, StoreError};
use crate::types::{JobId, MetricSnapshot, SeriesReport, SkipSummary};

const SERIES_TREE: &str = "oee_series";

/// Stored series with metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSeries {
    pub job_id: JobId,
    pub snapshots: Vec<MetricSnapshot>,
    /// Ticks in the grid the series was computed on
    #[serde(default)]
    pub grid_len: usize,
    /// Ticks dropped from `snapshots`
    #[serde(default)]
    pub skipped: SkipSummary,
    /// When the series was written
    pub stored_at: DateTime<Utc>,
}

impl StoredSeries {
    /// True when some grid ticks were dropped from the stored series
    pub fn is_partial(&self) -> bool {
        self.skipped.total > 0 || self.snapshots.len() < self.grid_len
    }
}

/// Sled-backed series sink
#[derive(Clone)]
pub struct SledSeriesStore {
    db: Arc<sled::Db>,
    tree: sled::Tree,
}

impl SledSeriesStore {
    /// Open or create the series database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let tree = db.open_tree(SERIES_TREE)?;

        tracing::info!(path = %path_ref.display(), "Series storage opened");

        Ok(Self {
            db: Arc::new(db),
            tree,
        })
    }

    pub fn get_series(&self, job_id: JobId) -> Result<Option<StoredSeries>, StoreError> {
        match self.tree.get(job_id.to_be_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Remove the stored series of `job_id`; returns whether one existed
    pub fn delete_series(&self, job_id: JobId) -> Result<bool, StoreError> {
        let removed = self.tree.remove(job_id.to_be_bytes())?.is_some();
        if removed {
            self.tree.flush()?;
        }
        Ok(removed)
    }

    /// Ids of all jobs with a stored series, ascending
    pub fn job_ids(&self) -> Vec<JobId> {
        self.tree
            .iter()
            .keys()
            .filter_map(|key| {
                let key = key.ok()?;
                let bytes: [u8; 8] = key.as_ref().try_into().ok()?;
                Some(u64::from_be_bytes(bytes))
            })
            .collect()
    }

    pub fn stats(&self) -> SeriesStoreStats {
        let mut snapshot_count = 0;
        for value in self.tree.iter().values().flatten() {
            match serde_json::from_slice::<StoredSeries>(&value) {
                Ok(series) => snapshot_count += series.snapshots.len(),
                Err(e) => tracing::warn!(error = %e, "Failed to deserialize stored series"),
            }
        }

        SeriesStoreStats {
            job_count: self.tree.len(),
            snapshot_count,
            size_bytes: self.db.size_on_disk().unwrap_or(0),
        }
    }
}

impl SeriesSink for SledSeriesStore {
    fn replace_series(&self, report: &SeriesReport) -> Result<(), StoreError> {
        let job_id = report.job_id;
        let stored = StoredSeries {
            job_id,
            snapshots: report.snapshots.clone(),
            grid_len: report.grid_len,
            skipped: report.skipped.clone(),
            stored_at: Utc::now(),
        };
        let value = serde_json::to_vec(&stored)?;
        self.tree.insert(job_id.to_be_bytes(), value)?;
        self.tree.flush()?;

        tracing::debug!(
            job_id,
            snapshots = stored.snapshots.len(),
            skipped = stored.skipped.total,
            "Replaced stored series"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct SeriesStoreStats {
    pub job_count: usize,
    pub snapshot_count: usize,
    pub size_bytes: u64,
}

impl SeriesStoreStats {
    /// Get size in megabytes
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}
