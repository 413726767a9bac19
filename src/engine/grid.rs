//! Sampling grid for one job window

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ordered tick timestamps from job start to job end.
///
/// Ticks are `start, start + interval, ...` strictly before `end`, followed
/// by `end` itself, so the last tick always lands on the job end even when
/// the interval does not divide the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingGrid {
    ticks: Vec<DateTime<Utc>>,
    interval: Duration,
}

impl SamplingGrid {
    /// Build the grid. Returns `None` when the interval is not positive or
    /// the window is inverted.
    pub fn build(start: DateTime<Utc>, end: DateTime<Utc>, interval: Duration) -> Option<Self> {
        if interval <= Duration::zero() || end < start {
            return None;
        }

        let span_ms = (end - start).num_milliseconds();
        let step_ms = interval.num_milliseconds().max(1);
        let capacity = usize::try_from(span_ms / step_ms).unwrap_or(0) + 2;

        let mut ticks = Vec::with_capacity(capacity);
        let mut tick = start;
        while tick < end {
            ticks.push(tick);
            tick += interval;
        }
        ticks.push(end);

        Some(Self { ticks, interval })
    }

    pub fn ticks(&self) -> &[DateTime<Utc>] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ordered batches of at most `batch_size` ticks
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, DateTime<Utc>> {
        self.ticks.chunks(batch_size.max(1))
    }
}

/// Caller-side interval policy that bounds the tick count of long jobs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GridPolicy {
    pub interval_minutes: u32,
    pub max_ticks: usize,
    pub auto_coarsen: bool,
}

impl Default for GridPolicy {
    fn default() -> Self {
        Self {
            interval_minutes: crate::config::defaults::DEFAULT_INTERVAL_MINUTES,
            max_ticks: crate::config::defaults::DEFAULT_MAX_TICKS,
            auto_coarsen: true,
        }
    }
}

impl GridPolicy {
    /// Interval to use for a window of `start..end`.
    ///
    /// Keeps the configured interval unless it would exceed `max_ticks`, in
    /// which case it coarsens to the smallest whole-minute interval that fits.
    pub fn interval_for(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
        let base = i64::from(self.interval_minutes.max(1));
        if !self.auto_coarsen || end <= start {
            return Duration::minutes(base);
        }

        let span_minutes = (end - start).num_minutes().max(1);
        // One tick is reserved for the pinned end tick
        let budget = i64::try_from(self.max_ticks.saturating_sub(1).max(1)).unwrap_or(i64::MAX);
        let needed = (span_minutes + budget - 1) / budget;

        Duration::minutes(base.max(needed))
    }
}
