//! Production counter reconstruction
//!
//! Counters are cumulative across jobs, so net production at a tick is the
//! counter reading in effect at that tick minus the virtual zero (first
//! reading at-or-after job start), scaled to base units.
//!
//! Lookups are a binary search per tick rather than a shared advancing
//! cursor, so ticks can be evaluated in any order and on any thread.

use chrono::{DateTime, Utc};

use crate::types::{last_index_at_or_before, CounterKind, TagSample};

/// Anchors resolved from the store before reconstruction starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterAnchors {
    /// Value of the first sample at-or-after job start
    pub virtual_zero: f64,
    /// Value of the last sample at-or-before job end
    pub end_value: f64,
}

/// Net production lookup for one job window
#[derive(Debug, Clone)]
pub struct CounterReconstructor {
    samples: Vec<TagSample>,
    anchors: CounterAnchors,
    job_end: DateTime<Utc>,
    kind: CounterKind,
    multiplier: f64,
}

impl CounterReconstructor {
    /// `samples` must be the job-window production samples ordered by time.
    pub fn new(
        samples: Vec<TagSample>,
        anchors: CounterAnchors,
        job_end: DateTime<Utc>,
        kind: CounterKind,
        containers_per_pack: f64,
    ) -> Self {
        Self {
            samples,
            anchors,
            job_end,
            kind,
            multiplier: kind.multiplier(containers_per_pack),
        }
    }

    /// Raw counter reading in effect at `tick`.
    ///
    /// Ticks at or past job end are pinned to the end anchor so the final
    /// tick always matches the authoritative end-of-job total. Ticks before
    /// the first window sample read the virtual zero.
    pub fn raw_value_at(&self, tick: DateTime<Utc>) -> f64 {
        if tick >= self.job_end {
            return self.anchors.end_value;
        }
        last_index_at_or_before(&self.samples, tick)
            .map_or(self.anchors.virtual_zero, |idx| self.samples[idx].value)
    }

    /// Net production since job start in base units.
    ///
    /// Negative values mean the counter went below the virtual zero (reset)
    /// and are returned as-is; callers drop those ticks.
    pub fn net_production_at(&self, tick: DateTime<Utc>) -> f64 {
        (self.raw_value_at(tick) - self.anchors.virtual_zero) * self.multiplier
    }

    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    pub fn anchors(&self) -> CounterAnchors {
        self.anchors
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn bottle_counter(points: &[(i64, f64)], end: i64) -> CounterReconstructor {
        let samples: Vec<_> = points.iter().map(|(m, v)| TagSample::new(1, *v, at(*m))).collect();
        let anchors = CounterAnchors {
            virtual_zero: samples[0].value,
            end_value: samples.last().map(|s| s.value).unwrap_or_default(),
        };
        CounterReconstructor::new(samples, anchors, at(end), CounterKind::BottleCount, 24.0)
    }

    #[test]
    fn test_net_production_follows_last_sample() {
        let counter = bottle_counter(&[(0, 100.0), (5, 150.0), (20, 300.0)], 20);
        assert_eq!(counter.net_production_at(at(0)), 0.0);
        assert_eq!(counter.net_production_at(at(4)), 0.0);
        assert_eq!(counter.net_production_at(at(5)), 50.0);
        assert_eq!(counter.net_production_at(at(19)), 50.0);
    }

    #[test]
    fn test_last_tick_pinned_to_end_anchor() {
        let samples = vec![
            TagSample::new(1, 100.0, at(0)),
            TagSample::new(1, 150.0, at(5)),
        ];
        // End anchor comes from the store, beyond what the window slice shows
        let anchors = CounterAnchors {
            virtual_zero: 100.0,
            end_value: 300.0,
        };
        let counter = CounterReconstructor::new(samples, anchors, at(20), CounterKind::BottleCount, 1.0);
        assert_eq!(counter.net_production_at(at(19)), 50.0);
        assert_eq!(counter.net_production_at(at(20)), 200.0);
    }

    #[test]
    fn test_case_count_multiplies_by_pack_size() {
        let samples = vec![TagSample::new(1, 10.0, at(0)), TagSample::new(1, 15.0, at(3))];
        let anchors = CounterAnchors {
            virtual_zero: 10.0,
            end_value: 15.0,
        };
        let counter = CounterReconstructor::new(samples, anchors, at(3), CounterKind::CaseCount, 24.0);
        assert_eq!(counter.net_production_at(at(3)), 120.0);
        assert_eq!(counter.kind(), CounterKind::CaseCount);
    }

    #[test]
    fn test_counter_reset_goes_negative() {
        let counter = bottle_counter(&[(0, 500.0), (1, 10.0)], 1);
        assert_eq!(counter.net_production_at(at(1)), -490.0);
    }

    #[test]
    fn test_out_of_order_ticks_are_consistent() {
        let counter = bottle_counter(&[(0, 0.0), (2, 20.0), (4, 40.0), (6, 60.0)], 6);
        let forward: Vec<f64> = (0..=6).map(|m| counter.net_production_at(at(m))).collect();
        let backward: Vec<f64> = (0..=6).rev().map(|m| counter.net_production_at(at(m))).collect();
        let mut backward = backward;
        backward.reverse();
        assert_eq!(forward, backward);
    }
}
