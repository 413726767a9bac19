//! Machine state codes and derived state runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Machine State Codes
// ============================================================================

/// Raw machine-state code as reported by the state tag.
///
/// Codes outside the [`MachineState`] catalogue are kept as-is; they never
/// match a configured state group unless listed there explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StateCode(pub i64);

impl StateCode {
    /// Convert a raw sample value into a state code.
    ///
    /// State tags carry integral codes; fractional values are truncated.
    pub fn from_sample_value(value: f64) -> Self {
        StateCode(value.trunc() as i64)
    }

    pub fn known(&self) -> Option<MachineState> {
        MachineState::from_code(self.0)
    }
}

impl std::fmt::Display for StateCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.known() {
            Some(state) => write!(f, "{} ({})", state, self.0),
            None => write!(f, "unknown ({})", self.0),
        }
    }
}

impl From<MachineState> for StateCode {
    fn from(state: MachineState) -> Self {
        StateCode(state.code())
    }
}

/// Weihenstephan-standard machine states (bit-flag codes)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MachineState {
    Stopped,
    Starting,
    Prepared,
    /// Infeed starved
    Lack,
    /// Outfeed blocked
    Tailback,
    LackBranchLine,
    TailbackBranchLine,
    Operating,
    Stopping,
    Aborting,
    EquipmentFailure,
    Holding,
    Held,
}

impl MachineState {
    pub const ALL: [MachineState; 13] = [
        MachineState::Stopped,
        MachineState::Starting,
        MachineState::Prepared,
        MachineState::Lack,
        MachineState::Tailback,
        MachineState::LackBranchLine,
        MachineState::TailbackBranchLine,
        MachineState::Operating,
        MachineState::Stopping,
        MachineState::Aborting,
        MachineState::EquipmentFailure,
        MachineState::Holding,
        MachineState::Held,
    ];

    pub fn code(&self) -> i64 {
        match self {
            MachineState::Stopped => 1,
            MachineState::Starting => 2,
            MachineState::Prepared => 4,
            MachineState::Lack => 8,
            MachineState::Tailback => 16,
            MachineState::LackBranchLine => 32,
            MachineState::TailbackBranchLine => 64,
            MachineState::Operating => 128,
            MachineState::Stopping => 256,
            MachineState::Aborting => 512,
            MachineState::EquipmentFailure => 1024,
            MachineState::Holding => 2048,
            MachineState::Held => 4096,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::Stopped => write!(f, "Stopped"),
            MachineState::Starting => write!(f, "Starting"),
            MachineState::Prepared => write!(f, "Prepared"),
            MachineState::Lack => write!(f, "Lack"),
            MachineState::Tailback => write!(f, "Tailback"),
            MachineState::LackBranchLine => write!(f, "Lack (branch line)"),
            MachineState::TailbackBranchLine => write!(f, "Tailback (branch line)"),
            MachineState::Operating => write!(f, "Operating"),
            MachineState::Stopping => write!(f, "Stopping"),
            MachineState::Aborting => write!(f, "Aborting"),
            MachineState::EquipmentFailure => write!(f, "Equipment Failure"),
            MachineState::Holding => write!(f, "Holding"),
            MachineState::Held => write!(f, "Held"),
        }
    }
}

// ============================================================================
// State Runs
// ============================================================================

/// A contiguous stretch of time the machine spent in one state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateRun {
    pub state: StateCode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
}

impl StateRun {
    pub fn new(state: StateCode, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            state,
            start_time,
            end_time,
            duration_minutes: minutes_between(start_time, end_time),
        }
    }

    /// Minutes of this run falling inside `[window_start, window_end]`.
    pub fn overlap_minutes(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> f64 {
        let start = self.start_time.max(window_start);
        let end = self.end_time.min(window_end);
        if end <= start {
            0.0
        } else {
            minutes_between(start, end)
        }
    }
}

/// Fractional minutes from `start` to `end` (negative if `end` precedes `start`).
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_machine_state_codes_round_trip() {
        for state in MachineState::ALL {
            assert_eq!(MachineState::from_code(state.code()), Some(state));
        }
        assert_eq!(MachineState::from_code(3), None);
        assert_eq!(StateCode::from_sample_value(1024.0).known(), Some(MachineState::EquipmentFailure));
    }

    #[test]
    fn test_overlap_clips_both_ends() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        let run = StateRun::new(
            StateCode(1),
            t0 + chrono::Duration::minutes(5),
            t0 + chrono::Duration::minutes(15),
        );
        assert_eq!(run.duration_minutes, 10.0);
        assert_eq!(run.overlap_minutes(t0, t0 + chrono::Duration::minutes(10)), 5.0);
        assert_eq!(
            run.overlap_minutes(t0 + chrono::Duration::minutes(7), t0 + chrono::Duration::minutes(30)),
            8.0
        );
        assert_eq!(run.overlap_minutes(t0, t0 + chrono::Duration::minutes(5)), 0.0);
    }

    #[test]
    fn test_fractional_minutes() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(minutes_between(t0, t0 + chrono::Duration::seconds(90)), 1.5);
    }
}
