//! Duration aggregation over state runs
//!
//! Durations are elapsed time between state transitions, clipped to the
//! query window. Sample counts never enter the sum, so the result does not
//! depend on the sampling cadence of the state tag.

use chrono::{DateTime, Utc};

use crate::types::{minutes_between, StateCode, StateRun};

/// A set of machine-state codes treated as one category (e.g. unplanned down)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSet {
    codes: Vec<StateCode>,
}

impl StateSet {
    pub fn new<I, C>(codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<StateCode>,
    {
        let mut codes: Vec<StateCode> = codes.into_iter().map(Into::into).collect();
        codes.sort();
        codes.dedup();
        Self { codes }
    }

    pub fn from_raw(codes: &[i64]) -> Self {
        Self::new(codes.iter().map(|c| StateCode(*c)))
    }

    pub fn contains(&self, code: StateCode) -> bool {
        self.codes.binary_search(&code).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[StateCode] {
        &self.codes
    }
}

/// Total minutes spent in any state of `targets` within `[window_start, window_end]`.
///
/// Each run contributes only the part that overlaps the window.
pub fn total_minutes_in(
    runs: &[StateRun],
    targets: &StateSet,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> f64 {
    runs.iter()
        .filter(|run| targets.contains(run.state))
        .map(|run| run.overlap_minutes(window_start, window_end))
        .sum()
}

/// Prefix-summed index answering "minutes in target states between the
/// origin and `t`" in O(log n).
///
/// Built once per computation; read-only afterwards and safe to share across
/// worker threads.
#[derive(Debug, Clone, Default)]
pub struct DurationIndex {
    origin: Option<DateTime<Utc>>,
    intervals: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    /// `prefix[i]` = total minutes of `intervals[..i]`
    prefix: Vec<f64>,
}

impl DurationIndex {
    /// Index the runs in `targets`, clipped to start no earlier than `origin`.
    pub fn build(runs: &[StateRun], targets: &StateSet, origin: DateTime<Utc>) -> Self {
        let intervals: Vec<_> = runs
            .iter()
            .filter(|run| targets.contains(run.state))
            .filter(|run| run.end_time > origin)
            .map(|run| (run.start_time.max(origin), run.end_time))
            .filter(|(start, end)| end > start)
            .collect();

        let mut prefix = Vec::with_capacity(intervals.len() + 1);
        let mut acc = 0.0;
        prefix.push(acc);
        for (start, end) in &intervals {
            acc += minutes_between(*start, *end);
            prefix.push(acc);
        }

        Self {
            origin: Some(origin),
            intervals,
            prefix,
        }
    }

    /// Minutes in target states within `[origin, t]`.
    pub fn minutes_until(&self, t: DateTime<Utc>) -> f64 {
        match self.origin {
            Some(origin) if t > origin => {}
            _ => return 0.0,
        }

        let complete = self.intervals.partition_point(|(_, end)| *end <= t);
        let mut total = self.prefix[complete];

        if let Some((start, _)) = self.intervals.get(complete) {
            if *start < t {
                total += minutes_between(*start, t);
            }
        }

        total
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sequence::extract_runs;
    use crate::types::{MachineState, TagSample};
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn runs(points: &[(i64, i64)]) -> Vec<StateRun> {
        let samples: Vec<_> = points
            .iter()
            .map(|(min, code)| TagSample::new(1, *code as f64, at(*min)))
            .collect();
        extract_runs(&samples)
    }

    fn udt_set() -> StateSet {
        StateSet::new([MachineState::Stopped, MachineState::EquipmentFailure])
    }

    #[test]
    fn test_state_set_membership() {
        let set = udt_set();
        assert!(set.contains(StateCode(1)));
        assert!(set.contains(StateCode(1024)));
        assert!(!set.contains(StateCode(128)));
        assert_eq!(StateSet::from_raw(&[16, 8, 16]).codes(), &[StateCode(8), StateCode(16)]);
    }

    #[test]
    fn test_sum_is_elapsed_time_not_sample_count() {
        // Stopped from 2 to 12 observed by only two samples
        let r = runs(&[(0, 128), (2, 1), (7, 1), (12, 128), (20, 128)]);
        assert_eq!(total_minutes_in(&r, &udt_set(), at(0), at(20)), 10.0);
    }

    #[test]
    fn test_runs_clipped_at_both_boundaries() {
        let r = runs(&[(0, 1), (10, 128), (15, 1024), (30, 128)]);
        // Stopped [0,10], failure [15,30]
        assert_eq!(total_minutes_in(&r, &udt_set(), at(5), at(20)), 10.0);
        assert_eq!(total_minutes_in(&r, &udt_set(), at(11), at(14)), 0.0);
    }

    #[test]
    fn test_index_matches_direct_sum() {
        let r = runs(&[(0, 128), (3, 1), (8, 128), (11, 1024), (12, 1024), (19, 128), (25, 1), (27, 1)]);
        let set = udt_set();
        let index = DurationIndex::build(&r, &set, at(0));
        for min in 0..=30 {
            let direct = total_minutes_in(&r, &set, at(0), at(min));
            assert!(
                (index.minutes_until(at(min)) - direct).abs() < 1e-9,
                "mismatch at minute {min}"
            );
        }
    }

    #[test]
    fn test_index_clips_to_origin() {
        let r = runs(&[(0, 1), (10, 128), (12, 128)]);
        let index = DurationIndex::build(&r, &udt_set(), at(4));
        assert_eq!(index.minutes_until(at(4)), 0.0);
        assert_eq!(index.minutes_until(at(6)), 2.0);
        assert_eq!(index.minutes_until(at(12)), 6.0);
        assert_eq!(index.interval_count(), 1);
    }

    #[test]
    fn test_empty_index_is_zero() {
        let index = DurationIndex::default();
        assert_eq!(index.minutes_until(at(10)), 0.0);
    }
}
