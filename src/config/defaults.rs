//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Sampling Grid
// ============================================================================

/// Default tick interval (minutes).
pub const DEFAULT_INTERVAL_MINUTES: u32 = 1;

/// Default upper bound on ticks per job before the interval is coarsened.
///
/// 10 080 = one week at one tick per minute.
pub const DEFAULT_MAX_TICKS: usize = 10_080;

// ============================================================================
// Evaluation
// ============================================================================

/// Ticks evaluated per parallel batch; batches run sequentially.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// ============================================================================
// Machine State Groups (Weihenstephan codes)
// ============================================================================

/// Unplanned down time: Stopped, Equipment Failure.
pub const DEFAULT_UNPLANNED_DOWN_STATES: [i64; 2] = [1, 1024];

/// Outfeed blocked.
pub const DEFAULT_TAILBACK_STATES: [i64; 1] = [16];

/// Infeed starved.
pub const DEFAULT_LACK_STATES: [i64; 1] = [8];

// ============================================================================
// Storage & Cache
// ============================================================================

/// Default sled database path for computed series.
pub const DEFAULT_SERIES_DB_PATH: &str = "data/oee_series";

/// Tag metadata cache capacity (entries).
pub const DEFAULT_TAG_CACHE_CAPACITY: usize = 4_096;
