//! In-memory store for testing and CSV replay
//!
//! Thread-safe via `RwLock`. Not durable: data is lost on drop.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use super::{JobCatalog, SeriesSink, StoreError, TagValueStore};
use crate::types::{
    first_index_at_or_after, last_index_at_or_before, Job, JobId, MetricSnapshot, SeriesReport,
    Tag, TagId, TagRef, TagSample, TaggableType,
};

#[derive(Default)]
pub struct InMemoryStore {
    tags: RwLock<Vec<Tag>>,
    samples: RwLock<HashMap<TagId, Vec<TagSample>>>,
    jobs: RwLock<HashMap<JobId, Job>>,
    pack_multipliers: RwLock<HashMap<u64, f64>>,
    /// Keyed by (sku_id, line_id)
    design_speeds: RwLock<HashMap<(u64, u64), f64>>,
    series: RwLock<HashMap<JobId, SeriesReport>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Storage(e.to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&self, tag: Tag) -> Result<(), StoreError> {
        let mut tags = self.tags.write().map_err(poisoned)?;
        tags.retain(|t| t.id != tag.id);
        tags.push(tag);
        Ok(())
    }

    /// Append samples; each tag's log is kept ordered by `created_at`.
    ///
    /// Samples with equal timestamps keep their insertion order.
    pub fn add_samples<I>(&self, samples: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = TagSample>,
    {
        let mut store = self.samples.write().map_err(poisoned)?;
        let mut touched = Vec::new();
        for sample in samples {
            touched.push(sample.tag_id);
            store.entry(sample.tag_id).or_default().push(sample);
        }
        touched.sort_unstable();
        touched.dedup();
        for tag_id in touched {
            if let Some(log) = store.get_mut(&tag_id) {
                log.sort_by_key(|s| s.created_at);
            }
        }
        Ok(())
    }

    pub fn add_job(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.write().map_err(poisoned)?.insert(job.id, job);
        Ok(())
    }

    pub fn set_pack_multiplier(&self, sku_id: u64, containers_per_pack: f64) -> Result<(), StoreError> {
        self.pack_multipliers
            .write()
            .map_err(poisoned)?
            .insert(sku_id, containers_per_pack);
        Ok(())
    }

    pub fn set_design_speed(&self, sku_id: u64, line_id: u64, units_per_hour: f64) -> Result<(), StoreError> {
        self.design_speeds
            .write()
            .map_err(poisoned)?
            .insert((sku_id, line_id), units_per_hour);
        Ok(())
    }

    /// Series last written for `job_id`
    pub fn series(&self, job_id: JobId) -> Result<Option<Vec<MetricSnapshot>>, StoreError> {
        Ok(self
            .series
            .read()
            .map_err(poisoned)?
            .get(&job_id)
            .map(|report| report.snapshots.clone()))
    }

    /// Full report last written for `job_id`, including its skip summary
    pub fn stored_report(&self, job_id: JobId) -> Result<Option<SeriesReport>, StoreError> {
        Ok(self.series.read().map_err(poisoned)?.get(&job_id).cloned())
    }

    pub fn sample_count(&self, tag_id: TagId) -> usize {
        self.samples
            .read()
            .map(|s| s.get(&tag_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl TagValueStore for InMemoryStore {
    fn get_tag(
        &self,
        taggable_type: TaggableType,
        taggable_id: u64,
        tag_ref: TagRef,
    ) -> Result<Option<Tag>, StoreError> {
        let tags = self.tags.read().map_err(poisoned)?;
        Ok(tags
            .iter()
            .find(|t| {
                t.taggable_type == taggable_type
                    && t.taggable_id == taggable_id
                    && t.tag_ref == tag_ref
            })
            .cloned())
    }

    fn get_samples(
        &self,
        tag_id: TagId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TagSample>, StoreError> {
        let store = self.samples.read().map_err(poisoned)?;
        let Some(log) = store.get(&tag_id) else {
            return Ok(Vec::new());
        };
        let lo = log.partition_point(|s| s.created_at < from);
        let hi = log.partition_point(|s| s.created_at <= to);
        Ok(if lo < hi { log[lo..hi].to_vec() } else { Vec::new() })
    }

    fn first_sample_at_or_after(
        &self,
        tag_id: TagId,
        t: DateTime<Utc>,
    ) -> Result<Option<TagSample>, StoreError> {
        let store = self.samples.read().map_err(poisoned)?;
        Ok(store
            .get(&tag_id)
            .and_then(|log| first_index_at_or_after(log, t).map(|i| log[i].clone())))
    }

    fn last_sample_at_or_before(
        &self,
        tag_id: TagId,
        t: DateTime<Utc>,
    ) -> Result<Option<TagSample>, StoreError> {
        let store = self.samples.read().map_err(poisoned)?;
        Ok(store
            .get(&tag_id)
            .and_then(|log| last_index_at_or_before(log, t).map(|i| log[i].clone())))
    }
}

impl JobCatalog for InMemoryStore {
    fn get_job(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().map_err(poisoned)?.get(&job_id).cloned())
    }

    fn sku_pack_multiplier(&self, sku_id: u64) -> Result<f64, StoreError> {
        self.pack_multipliers
            .read()
            .map_err(poisoned)?
            .get(&sku_id)
            .copied()
            .ok_or_else(|| StoreError::NotFound(format!("pack multiplier for sku {sku_id}")))
    }

    fn design_speed(&self, job: &Job, line_id: u64) -> f64 {
        self.design_speeds
            .read()
            .ok()
            .and_then(|speeds| speeds.get(&(job.sku_id, line_id)).copied())
            .unwrap_or(0.0)
    }
}

impl SeriesSink for InMemoryStore {
    fn replace_series(&self, report: &SeriesReport) -> Result<(), StoreError> {
        self.series
            .write()
            .map_err(poisoned)?
            .insert(report.job_id, report.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CounterKind, LossTracking, SkipSummary};
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    #[test]
    fn test_samples_kept_ordered() {
        let store = InMemoryStore::new();
        store
            .add_samples(vec![
                TagSample::new(1, 3.0, at(3)),
                TagSample::new(1, 1.0, at(1)),
                TagSample::new(2, 9.0, at(0)),
            ])
            .unwrap();
        store.add_samples(vec![TagSample::new(1, 2.0, at(2))]).unwrap();

        let samples = store.get_samples(1, at(0), at(10)).unwrap();
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(store.sample_count(2), 1);
    }

    #[test]
    fn test_range_and_anchor_queries() {
        let store = InMemoryStore::new();
        store
            .add_samples((0..10).map(|m| TagSample::new(1, m as f64, at(m * 2))))
            .unwrap();

        assert_eq!(store.get_samples(1, at(3), at(8)).unwrap().len(), 3);
        assert!(store.get_samples(1, at(100), at(200)).unwrap().is_empty());
        assert_eq!(store.first_sample_at_or_after(1, at(3)).unwrap().unwrap().created_at, at(4));
        assert_eq!(store.last_sample_at_or_before(1, at(3)).unwrap().unwrap().created_at, at(2));
        assert!(store.last_sample_at_or_before(1, at(-1)).unwrap().is_none());
        assert!(store.first_sample_at_or_after(7, at(0)).unwrap().is_none());
    }

    #[test]
    fn test_tag_lookup() {
        let store = InMemoryStore::new();
        store
            .add_tag(Tag {
                id: 5,
                taggable_type: TaggableType::Machine,
                taggable_id: 3,
                tag_ref: TagRef::BottleCount,
            })
            .unwrap();
        assert_eq!(
            store.get_tag(TaggableType::Machine, 3, TagRef::BottleCount).unwrap().map(|t| t.id),
            Some(5)
        );
        assert!(store.get_tag(TaggableType::Line, 3, TagRef::BottleCount).unwrap().is_none());
    }

    #[test]
    fn test_catalog_defaults() {
        let store = InMemoryStore::new();
        let job = Job {
            id: 1,
            line_id: 2,
            machine_id: 3,
            sku_id: 4,
            actual_start_time: at(0),
            actual_end_time: Some(at(60)),
        };
        assert_eq!(store.design_speed(&job, 2), 0.0);
        assert!(matches!(store.sku_pack_multiplier(4), Err(StoreError::NotFound(_))));

        store.set_design_speed(4, 2, 36_000.0).unwrap();
        store.set_pack_multiplier(4, 24.0).unwrap();
        assert_eq!(store.design_speed(&job, 2), 36_000.0);
        assert_eq!(store.sku_pack_multiplier(4).unwrap(), 24.0);
    }

    #[test]
    fn test_replace_series_overwrites() {
        let store = InMemoryStore::new();
        let mut report = SeriesReport {
            job_id: 1,
            counter_kind: CounterKind::BottleCount,
            design_speed: 600.0,
            interval_secs: 60,
            grid_len: 4,
            snapshots: Vec::new(),
            skipped: SkipSummary::default(),
            loss_tracking: LossTracking::NotConfigured,
        };
        store.replace_series(&report).unwrap();
        report.grid_len = 9;
        store.replace_series(&report).unwrap();

        assert_eq!(store.series(1).unwrap().map(|s| s.len()), Some(0));
        assert_eq!(store.stored_report(1).unwrap().map(|r| r.grid_len), Some(9));
        assert!(store.series(2).unwrap().is_none());
        assert_eq!(store.backend_name(), "InMemory");
    }
}
