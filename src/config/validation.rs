//! Config validation: unknown-key detection with Levenshtein suggestions
//! and operating-range checks.
//!
//! The raw TOML is first parsed into `toml::Value` and its key tree compared
//! against the known field names. Unknown keys only produce warnings, so an
//! older or hand-edited config keeps loading.

use std::collections::HashSet;

use crate::types::{MachineState, StateCode};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `EngineConfig`.
///
/// Must be kept in step with the struct hierarchy in engine_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [grid]
        "grid",
        "grid.interval_minutes",
        "grid.max_ticks",
        "grid.auto_coarsen",
        // [evaluation]
        "evaluation",
        "evaluation.batch_size",
        "evaluation.allow_open_jobs",
        // [states]
        "states",
        "states.unplanned_down",
        "states.tailback",
        "states.lack",
        // [storage]
        "storage",
        "storage.series_db_path",
        // [cache]
        "cache",
        "cache.tag_cache_capacity",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Operating Range Checks
// ============================================================================

/// Longest tick interval that still yields a useful intra-shift series.
const MAX_SENSIBLE_INTERVAL_MINUTES: u32 = 60;

/// Warn about values that are legal but probably unintended.
///
/// - Intervals longer than an hour
/// - State codes outside the Weihenstephan set
pub fn check_operating_ranges(config: &super::EngineConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if config.grid.interval_minutes > MAX_SENSIBLE_INTERVAL_MINUTES {
        warnings.push(ValidationWarning {
            field: "grid.interval_minutes".to_string(),
            message: format!(
                "grid.interval_minutes = {} is coarser than {} minutes",
                config.grid.interval_minutes, MAX_SENSIBLE_INTERVAL_MINUTES
            ),
            suggestion: None,
        });
    }

    let groups = [
        ("states.unplanned_down", &config.states.unplanned_down),
        ("states.tailback", &config.states.tailback),
        ("states.lack", &config.states.lack),
    ];
    for (field, codes) in groups {
        for &code in codes.iter() {
            if StateCode(code).known().is_none() {
                warnings.push(ValidationWarning {
                    field: field.to_string(),
                    message: format!("{field} contains unknown machine state code {code}"),
                    suggestion: nearest_state_code(code).map(|s| s.code().to_string()),
                });
            }
        }
    }

    warnings
}

/// Closest Weihenstephan code by absolute distance
fn nearest_state_code(code: i64) -> Option<MachineState> {
    MachineState::ALL
        .iter()
        .copied()
        .min_by_key(|s| (s.code() - code).unsigned_abs())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("grid", "grid"), 0);
        assert_eq!(levenshtein("intreval", "interval"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [grid]
            interval_minutes = 5
            [states]
            lack = [8]
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"grid".to_string()));
        assert!(keys.contains(&"grid.interval_minutes".to_string()));
        assert!(keys.contains(&"states.lack".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[grid]
interval_minuts = 5
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "grid.interval_minuts");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("grid.interval_minutes"));
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let warnings = validate_unknown_keys(
            r#"
[grid]
interval_minutes = 1
max_ticks = 500

[states]
unplanned_down = [1, 1024]

[cache]
tag_cache_capacity = 64
"#,
        );
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_garbage_key_has_no_suggestion() {
        let warnings = validate_unknown_keys("completely_unrelated_garbage_key_xyz = 1");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].suggestion.is_none());
    }

    #[test]
    fn test_operating_ranges_defaults_clean() {
        let config = crate::config::EngineConfig::default();
        assert!(check_operating_ranges(&config).is_empty());
    }

    #[test]
    fn test_unknown_state_code_suggests_nearest() {
        let mut config = crate::config::EngineConfig::default();
        config.states.tailback = vec![17];
        config.grid.interval_minutes = 120;
        let warnings = check_operating_ranges(&config);
        assert_eq!(warnings.len(), 2);
        let state_warning = warnings
            .iter()
            .find(|w| w.field == "states.tailback")
            .unwrap();
        assert_eq!(state_warning.suggestion.as_deref(), Some("16"));
    }
}
