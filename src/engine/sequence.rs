//! Sequence extraction: machine-state samples to contiguous state runs
//!
//! One pass over ordered samples with sample-and-hold semantics: a state
//! holds until a sample with a different code is observed. The run in
//! progress closes at the timestamp of that sample, which is where the new
//! run begins, so runs tile the observed span without gaps or overlaps. The
//! final sample always closes the final run at its own timestamp, even when
//! its code equals the running state.

use chrono::{DateTime, Utc};

use crate::types::{StateCode, StateRun, TagSample};

/// Build state runs from ordered machine-state samples.
///
/// Empty input yields no runs. A single sample yields one zero-length run.
pub fn extract_runs(samples: &[TagSample]) -> Vec<StateRun> {
    runs_from_points(
        samples
            .iter()
            .map(|s| (StateCode::from_sample_value(s.value), s.created_at)),
    )
}

/// Build state runs for a window, seeding the run list with the state that
/// was in effect at `window_start`.
///
/// `prior` is the state of the last sample at-or-before `window_start`. It is
/// only used when the window samples do not already begin at `window_start`.
pub fn extract_runs_seeded(
    prior: Option<StateCode>,
    window_start: DateTime<Utc>,
    samples: &[TagSample],
) -> Vec<StateRun> {
    let starts_at_window = samples
        .first()
        .is_some_and(|s| s.created_at <= window_start);

    let seed = prior
        .filter(|_| !starts_at_window)
        .map(|state| (state, window_start));

    runs_from_points(
        seed.into_iter().chain(
            samples
                .iter()
                .map(|s| (StateCode::from_sample_value(s.value), s.created_at)),
        ),
    )
}

fn runs_from_points<I>(points: I) -> Vec<StateRun>
where
    I: IntoIterator<Item = (StateCode, DateTime<Utc>)>,
{
    let mut points = points.into_iter();
    let Some((first_state, first_time)) = points.next() else {
        return Vec::new();
    };

    let mut runs = Vec::new();
    let mut state = first_state;
    let mut run_start = first_time;
    let mut last_time = first_time;

    for (code, time) in points {
        if code != state {
            runs.push(StateRun::new(state, run_start, time));
            state = code;
            run_start = time;
        }
        last_time = time;
    }

    runs.push(StateRun::new(state, run_start, last_time));
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(min)
    }

    fn sample(min: i64, code: i64) -> TagSample {
        TagSample::new(9, code as f64, at(min))
    }

    #[test]
    fn test_empty_input_yields_no_runs() {
        assert!(extract_runs(&[]).is_empty());
    }

    #[test]
    fn test_single_sample_is_zero_length_run() {
        let runs = extract_runs(&[sample(3, 128)]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start_time, at(3));
        assert_eq!(runs[0].end_time, at(3));
        assert_eq!(runs[0].duration_minutes, 0.0);
    }

    #[test]
    fn test_transitions_split_runs() {
        let samples = vec![
            sample(0, 128),
            sample(1, 128),
            sample(2, 1),
            sample(5, 1),
            sample(6, 128),
            sample(10, 128),
        ];
        let runs = extract_runs(&samples);
        assert_eq!(runs.len(), 3);

        assert_eq!(runs[0].state, StateCode(128));
        assert_eq!((runs[0].start_time, runs[0].end_time), (at(0), at(2)));
        assert_eq!(runs[1].state, StateCode(1));
        assert_eq!((runs[1].start_time, runs[1].end_time), (at(2), at(6)));
        assert_eq!(runs[2].state, StateCode(128));
        assert_eq!((runs[2].start_time, runs[2].end_time), (at(6), at(10)));

        let total: f64 = runs.iter().map(|r| r.duration_minutes).sum();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn test_final_sample_closes_final_run() {
        let runs = extract_runs(&[sample(0, 1), sample(4, 1), sample(9, 1)]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].end_time, at(9));
        assert_eq!(runs[0].duration_minutes, 9.0);
    }

    #[test]
    fn test_seeded_runs_start_at_window() {
        let runs = extract_runs_seeded(Some(StateCode(1024)), at(0), &[sample(4, 128), sample(8, 128)]);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].state, StateCode(1024));
        assert_eq!((runs[0].start_time, runs[0].end_time), (at(0), at(4)));
        assert_eq!(runs[0].duration_minutes, 4.0);
        assert_eq!(runs[1].end_time, at(8));
    }

    #[test]
    fn test_seed_ignored_when_samples_start_at_window() {
        let runs = extract_runs_seeded(Some(StateCode(1024)), at(0), &[sample(0, 128), sample(8, 128)]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].state, StateCode(128));
    }
}
