//! Tag and tag-sample types
//!
//! A tag is one physical signal on a line or machine (production counter,
//! reject counter, machine-state code). Samples are append-only readings
//! ordered by `created_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Store-assigned tag identifier
pub type TagId = u64;

/// Kind of entity a tag is attached to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TaggableType {
    Line,
    Machine,
}

impl std::fmt::Display for TaggableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaggableType::Line => write!(f, "line"),
            TaggableType::Machine => write!(f, "machine"),
        }
    }
}

/// Well-known tag references used by the OEE engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagRef {
    /// Production counter counting cases (multiply by containers per pack)
    CaseCount,
    /// Production counter counting bottles directly
    BottleCount,
    /// Reject counter (bottles)
    RejectCount,
    /// Discrete machine-state code
    MachineState,
}

impl TagRef {
    /// Reference string as stored on the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            TagRef::CaseCount => "CASE_COUNT",
            TagRef::BottleCount => "BOTTLE_COUNT",
            TagRef::RejectCount => "REJECT_COUNT",
            TagRef::MachineState => "MACHINE_STATE",
        }
    }
}

impl std::fmt::Display for TagRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASE_COUNT" => Ok(TagRef::CaseCount),
            "BOTTLE_COUNT" => Ok(TagRef::BottleCount),
            "REJECT_COUNT" => Ok(TagRef::RejectCount),
            "MACHINE_STATE" => Ok(TagRef::MachineState),
            other => Err(format!("unknown tag ref '{other}'")),
        }
    }
}

/// Tag metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub taggable_type: TaggableType,
    pub taggable_id: u64,
    pub tag_ref: TagRef,
}

/// One reading of a tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagSample {
    pub tag_id: TagId,
    /// Numeric value; numeric strings are accepted on input
    #[serde(deserialize_with = "deserialize_numeric")]
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

impl TagSample {
    pub fn new(tag_id: TagId, value: f64, created_at: DateTime<Utc>) -> Self {
        Self {
            tag_id,
            value,
            created_at,
        }
    }
}

/// Parse a sample value that may arrive as a number or a numeric string.
///
/// Returns `None` for empty, non-numeric, or non-finite input.
pub fn parse_sample_value(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

fn deserialize_numeric<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(v) if v.is_finite() => Ok(v),
        Raw::Number(v) => Err(serde::de::Error::custom(format!(
            "non-finite sample value {v}"
        ))),
        Raw::Text(s) => parse_sample_value(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("sample value '{s}' is not numeric"))
        }),
    }
}

/// Index of the last sample at-or-before `t` in a slice ordered by `created_at`.
pub fn last_index_at_or_before(samples: &[TagSample], t: DateTime<Utc>) -> Option<usize> {
    samples
        .partition_point(|s| s.created_at <= t)
        .checked_sub(1)
}

/// Index of the first sample at-or-after `t` in a slice ordered by `created_at`.
pub fn first_index_at_or_after(samples: &[TagSample], t: DateTime<Utc>) -> Option<usize> {
    let idx = samples.partition_point(|s| s.created_at < t);
    (idx < samples.len()).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    #[test]
    fn test_sample_value_accepts_numeric_strings() {
        let json = r#"{"tag_id": 3, "value": "42.5", "created_at": "2024-03-01T06:00:00Z"}"#;
        let sample: TagSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.value, 42.5);

        let json = r#"{"tag_id": 3, "value": 7, "created_at": "2024-03-01T06:00:00Z"}"#;
        let sample: TagSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.value, 7.0);
    }

    #[test]
    fn test_sample_value_rejects_garbage() {
        let json = r#"{"tag_id": 3, "value": "n/a", "created_at": "2024-03-01T06:00:00Z"}"#;
        assert!(serde_json::from_str::<TagSample>(json).is_err());
        assert_eq!(parse_sample_value(" 12 "), Some(12.0));
        assert_eq!(parse_sample_value("NaN"), None);
        assert_eq!(parse_sample_value(""), None);
    }

    #[test]
    fn test_index_lookups() {
        let samples = vec![
            TagSample::new(1, 10.0, at(0)),
            TagSample::new(1, 20.0, at(5)),
            TagSample::new(1, 30.0, at(5)),
            TagSample::new(1, 40.0, at(9)),
        ];
        assert_eq!(last_index_at_or_before(&samples, at(-1)), None);
        assert_eq!(last_index_at_or_before(&samples, at(0)), Some(0));
        // Duplicates at the same minute resolve to the latest one
        assert_eq!(last_index_at_or_before(&samples, at(5)), Some(2));
        assert_eq!(last_index_at_or_before(&samples, at(100)), Some(3));

        assert_eq!(first_index_at_or_after(&samples, at(1)), Some(1));
        assert_eq!(first_index_at_or_after(&samples, at(9)), Some(3));
        assert_eq!(first_index_at_or_after(&samples, at(10)), None);
    }

    #[test]
    fn test_tag_ref_parsing() {
        assert_eq!("case_count".parse::<TagRef>(), Ok(TagRef::CaseCount));
        assert_eq!(TagRef::MachineState.to_string(), "MACHINE_STATE");
        assert!("speed".parse::<TagRef>().is_err());
    }
}
