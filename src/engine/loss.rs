//! Reject-counter loss between job start and a cutoff

use chrono::{DateTime, Utc};

use crate::types::{last_index_at_or_before, LossTracking, TagSample};

/// Rejected-unit lookup for one job window
#[derive(Debug, Clone)]
pub struct LossCalculator {
    /// Reading in effect at job start
    baseline: Option<f64>,
    /// Samples strictly after job start, up to job end, ordered by time
    samples: Vec<TagSample>,
    tracking: LossTracking,
}

impl LossCalculator {
    /// No reject tag configured: losses are not tracked and always zero.
    pub fn not_configured() -> Self {
        Self {
            baseline: None,
            samples: Vec::new(),
            tracking: LossTracking::NotConfigured,
        }
    }

    /// `baseline` is the last reject sample at-or-before job start;
    /// `window_samples` are the reject samples inside the job window.
    pub fn new(
        baseline: Option<&TagSample>,
        window_samples: Vec<TagSample>,
        job_start: DateTime<Utc>,
    ) -> Self {
        let samples: Vec<_> = window_samples
            .into_iter()
            .filter(|s| s.created_at > job_start)
            .collect();

        let tracking = match (baseline, samples.is_empty()) {
            (None, _) => LossTracking::NoBaseline,
            (Some(_), true) => LossTracking::FlatlineInWindow,
            (Some(_), false) => LossTracking::Tracked,
        };

        Self {
            baseline: baseline.map(|s| s.value),
            samples,
            tracking,
        }
    }

    /// Rejected units between job start and `cutoff`.
    ///
    /// Zero when the baseline is unresolvable. Negative values mean the
    /// reject counter went backwards and are returned as-is.
    pub fn lost_units_at(&self, cutoff: DateTime<Utc>) -> f64 {
        let Some(baseline) = self.baseline else {
            return 0.0;
        };
        let current = last_index_at_or_before(&self.samples, cutoff)
            .map_or(baseline, |idx| self.samples[idx].value);
        current - baseline
    }

    pub fn tracking(&self) -> LossTracking {
        self.tracking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    #[test]
    fn test_loss_is_delta_from_baseline() {
        let baseline = TagSample::new(2, 40.0, at(-10));
        let samples = vec![TagSample::new(2, 42.0, at(3)), TagSample::new(2, 47.0, at(8))];
        let calc = LossCalculator::new(Some(&baseline), samples, at(0));
        assert_eq!(calc.tracking(), LossTracking::Tracked);
        assert_eq!(calc.lost_units_at(at(0)), 0.0);
        assert_eq!(calc.lost_units_at(at(5)), 2.0);
        assert_eq!(calc.lost_units_at(at(10)), 7.0);
    }

    #[test]
    fn test_not_configured_is_zero() {
        let calc = LossCalculator::not_configured();
        assert_eq!(calc.tracking(), LossTracking::NotConfigured);
        assert_eq!(calc.lost_units_at(at(10)), 0.0);
    }

    #[test]
    fn test_missing_baseline_is_reported() {
        let samples = vec![TagSample::new(2, 42.0, at(3))];
        let calc = LossCalculator::new(None, samples, at(0));
        assert_eq!(calc.tracking(), LossTracking::NoBaseline);
        assert_eq!(calc.lost_units_at(at(10)), 0.0);
    }

    #[test]
    fn test_flatline_in_window_is_reported() {
        let baseline = TagSample::new(2, 40.0, at(0));
        // The only window sample sits exactly at job start and is the baseline itself
        let calc = LossCalculator::new(Some(&baseline), vec![baseline.clone()], at(0));
        assert_eq!(calc.tracking(), LossTracking::FlatlineInWindow);
        assert_eq!(calc.lost_units_at(at(10)), 0.0);
    }
}
