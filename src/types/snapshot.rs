//! Per-tick metric snapshots and the assembled series report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CounterKind, JobId};

/// Full metric chain evaluated at one tick over `[job start, timestamp]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Net production since job start in base units (bottles)
    pub net_production_units: f64,
    /// Rejected units since job start
    pub lost_units: f64,
    /// Design speed (units per hour)
    pub design_speed: f64,
    /// Value Operating Time (min)
    pub vot: f64,
    /// Quality Loss (%)
    pub ql: f64,
    /// Net Operating Time
    pub not: f64,
    /// Unplanned Down Time (min)
    pub udt: f64,
    /// Gross Operating Time (min)
    pub got: f64,
    pub slt: f64,
    pub sl: f64,
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub oee: f64,
}

// ============================================================================
// Tick Outcomes
// ============================================================================

/// Why a tick was dropped from the series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Design speed resolved to zero or below
    NonPositiveDesignSpeed,
    /// Production counter fell below the virtual zero (counter reset suspected)
    NegativeProduction,
    /// Reject counter fell below its baseline (counter reset suspected)
    NegativeLoss,
    /// VOT was NaN, infinite, or negative
    InvalidVot,
    /// OEE was NaN, infinite, or negative
    InvalidOee,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NonPositiveDesignSpeed => write!(f, "non-positive design speed"),
            SkipReason::NegativeProduction => write!(f, "negative net production"),
            SkipReason::NegativeLoss => write!(f, "negative reject loss"),
            SkipReason::InvalidVot => write!(f, "non-finite or negative VOT"),
            SkipReason::InvalidOee => write!(f, "non-finite or negative OEE"),
        }
    }
}

/// A dropped tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TickSkip {
    pub timestamp: DateTime<Utc>,
    pub reason: SkipReason,
}

/// Result of evaluating one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Valid(MetricSnapshot),
    Skipped(TickSkip),
}

impl TickOutcome {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TickOutcome::Valid(s) => s.timestamp,
            TickOutcome::Skipped(s) => s.timestamp,
        }
    }
}

/// Counts of dropped ticks, by reason
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkipSummary {
    pub total: usize,
    pub by_reason: BTreeMap<SkipReason, usize>,
    pub first_skipped_at: Option<DateTime<Utc>>,
}

impl SkipSummary {
    pub fn record(&mut self, skip: &TickSkip) {
        self.total += 1;
        *self.by_reason.entry(skip.reason).or_insert(0) += 1;
        self.first_skipped_at = Some(match self.first_skipped_at {
            Some(t) => t.min(skip.timestamp),
            None => skip.timestamp,
        });
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.by_reason.get(&reason).copied().unwrap_or(0)
    }

    /// Most frequent skip reason
    pub fn primary_reason(&self) -> Option<(SkipReason, usize)> {
        self.by_reason
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(r, c)| (*r, *c))
    }
}

// ============================================================================
// Loss Tracking
// ============================================================================

/// How the reject counter contributed to this series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LossTracking {
    /// No reject tag configured; losses are not tracked
    NotConfigured,
    /// Reject tag has a baseline at job start and samples inside the window
    Tracked,
    /// Reject tag configured but no sample at or before job start
    NoBaseline,
    /// Reject tag has a baseline but no samples inside the job window
    FlatlineInWindow,
}

impl LossTracking {
    /// Whether loss figures in the series are backed by reject data
    pub fn is_tracked(&self) -> bool {
        matches!(self, LossTracking::Tracked)
    }
}

impl std::fmt::Display for LossTracking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LossTracking::NotConfigured => write!(f, "not configured"),
            LossTracking::Tracked => write!(f, "tracked"),
            LossTracking::NoBaseline => write!(f, "configured, no baseline at job start"),
            LossTracking::FlatlineInWindow => write!(f, "configured, no samples in job window"),
        }
    }
}

// ============================================================================
// Series Report
// ============================================================================

/// Assembled OEE time series for one job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesReport {
    pub job_id: JobId,
    pub counter_kind: CounterKind,
    pub design_speed: f64,
    pub interval_secs: i64,
    /// Number of ticks on the sampling grid
    pub grid_len: usize,
    /// Valid snapshots, strictly ascending by timestamp
    pub snapshots: Vec<MetricSnapshot>,
    pub skipped: SkipSummary,
    pub loss_tracking: LossTracking,
}

impl SeriesReport {
    pub fn valid_ticks(&self) -> usize {
        self.snapshots.len()
    }

    /// True when every grid tick produced a snapshot
    pub fn is_complete(&self) -> bool {
        self.skipped.total == 0
    }

    /// Snapshot at the end of the job window, if that tick was valid
    pub fn final_snapshot(&self) -> Option<&MetricSnapshot> {
        self.snapshots.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_skip_summary_counts() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let mut summary = SkipSummary::default();
        summary.record(&TickSkip {
            timestamp: t0 + chrono::Duration::minutes(5),
            reason: SkipReason::NegativeProduction,
        });
        summary.record(&TickSkip {
            timestamp: t0 + chrono::Duration::minutes(1),
            reason: SkipReason::NegativeProduction,
        });
        summary.record(&TickSkip {
            timestamp: t0 + chrono::Duration::minutes(3),
            reason: SkipReason::InvalidOee,
        });

        assert_eq!(summary.total, 3);
        assert_eq!(summary.count(SkipReason::NegativeProduction), 2);
        assert_eq!(summary.count(SkipReason::NonPositiveDesignSpeed), 0);
        assert_eq!(summary.primary_reason(), Some((SkipReason::NegativeProduction, 2)));
        assert_eq!(summary.first_skipped_at, Some(t0 + chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_skip_summary_serializes_reason_keys() {
        let mut summary = SkipSummary::default();
        summary.record(&TickSkip {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap(),
            reason: SkipReason::NonPositiveDesignSpeed,
        });
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("non_positive_design_speed"));
    }
}
