//! Line fixture: job metadata and tag wiring for offline replay
//!
//! ```toml
//! design_speed = 6000.0        # units per hour
//! containers_per_pack = 24.0
//!
//! [job]
//! id = 1
//! line_id = 10
//! machine_id = 3
//! sku_id = 7
//! actual_start_time = "2024-03-01T06:00:00Z"
//! actual_end_time = "2024-03-01T14:00:00Z"
//!
//! [[tags]]
//! id = 1
//! taggable_type = "machine"
//! taggable_id = 3
//! tag_ref = "CASE_COUNT"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{InMemoryStore, StoreError};
use crate::types::{Job, Tag, TagSample};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse fixture {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize fixture: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("fixture has duplicate tag id {0}")]
    DuplicateTag(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the engine needs about one job, minus the samples
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineFixture {
    /// Design speed of the job's SKU on its line, units per hour
    pub design_speed: f64,
    /// Containers per pack for the job's SKU
    #[serde(default = "default_containers_per_pack")]
    pub containers_per_pack: f64,
    pub job: Job,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

fn default_containers_per_pack() -> f64 {
    1.0
}

impl LineFixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let path_str = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path_str.clone(),
            source,
        })?;
        let fixture: Self = toml::from_str(&contents).map_err(|source| FixtureError::Parse {
            path: path_str,
            source,
        })?;
        fixture.check_tags()?;
        Ok(fixture)
    }

    pub fn to_toml(&self) -> Result<String, FixtureError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn check_tags(&self) -> Result<(), FixtureError> {
        let mut ids: Vec<u64> = self.tags.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        match ids.windows(2).find(|w| w[0] == w[1]) {
            Some(w) => Err(FixtureError::DuplicateTag(w[0])),
            None => Ok(()),
        }
    }

    /// Build an in-memory store holding the job, its tags, and `samples`.
    ///
    /// Samples of tags not declared in the fixture are kept; they are simply
    /// never resolved.
    pub fn into_store(self, samples: Vec<TagSample>) -> Result<InMemoryStore, FixtureError> {
        self.check_tags()?;
        let store = InMemoryStore::new();
        for tag in self.tags {
            store.add_tag(tag)?;
        }
        store.set_design_speed(self.job.sku_id, self.job.line_id, self.design_speed)?;
        store.set_pack_multiplier(self.job.sku_id, self.containers_per_pack)?;
        store.add_job(self.job)?;
        store.add_samples(samples)?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JobCatalog, TagValueStore};
    use crate::types::{TagRef, TaggableType};
    use chrono::{TimeZone, Utc};

    const FIXTURE: &str = r#"
design_speed = 6000.0
containers_per_pack = 24.0

[job]
id = 1
line_id = 10
machine_id = 3
sku_id = 7
actual_start_time = "2024-03-01T06:00:00Z"
actual_end_time = "2024-03-01T14:00:00Z"

[[tags]]
id = 1
taggable_type = "machine"
taggable_id = 3
tag_ref = "CASE_COUNT"

[[tags]]
id = 2
taggable_type = "line"
taggable_id = 10
tag_ref = "MACHINE_STATE"
"#;

    #[test]
    fn test_fixture_into_store() {
        let fixture: LineFixture = toml::from_str(FIXTURE).unwrap();
        assert_eq!(fixture.tags.len(), 2);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let store = fixture
            .into_store(vec![TagSample::new(1, 10.0, t0)])
            .unwrap();

        let job = store.get_job(1).unwrap().unwrap();
        assert!(job.is_closed());
        assert_eq!(store.design_speed(&job, 10), 6000.0);
        assert_eq!(store.sku_pack_multiplier(7).unwrap(), 24.0);
        let tag = store
            .get_tag(TaggableType::Line, 10, TagRef::MachineState)
            .unwrap()
            .unwrap();
        assert_eq!(tag.id, 2);
        assert_eq!(store.sample_count(1), 1);
    }

    #[test]
    fn test_duplicate_tag_ids_rejected() {
        let mut fixture: LineFixture = toml::from_str(FIXTURE).unwrap();
        let dup = fixture.tags[0].clone();
        fixture.tags.push(dup);
        assert!(matches!(
            fixture.into_store(Vec::new()),
            Err(FixtureError::DuplicateTag(1))
        ));
    }

    #[test]
    fn test_fixture_toml_round_trip() {
        let fixture: LineFixture = toml::from_str(FIXTURE).unwrap();
        let text = fixture.to_toml().unwrap();
        let back: LineFixture = toml::from_str(&text).unwrap();
        assert_eq!(back, fixture);
    }
}
