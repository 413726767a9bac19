//! Config Validation Tests
//!
//! Typo detection for unknown keys, consistency validation, and the
//! operating-range warnings for `EngineConfig`.

use std::io::Write;

use oee_engine::config::validation::{
    check_operating_ranges, known_config_keys, suggest_correction, validate_unknown_keys,
};
use oee_engine::config::{ConfigError, EngineConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_grid_key_warns_with_suggestion() {
    let toml_str = r#"
[grid]
intreval_minutes = 5
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "grid.intreval_minutes");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("grid.interval_minutes"),
        "Should suggest the correct spelling"
    );
    assert!(warnings[0].to_string().contains("did you mean 'grid.interval_minutes'"));
}

#[test]
fn typo_in_evaluation_key_is_caught() {
    let toml_str = r#"
[evaluation]
batch_sise = 50
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("evaluation.batch_size")
    );
}

#[test]
fn unknown_section_reports_every_key() {
    let toml_str = r#"
[dashboard]
refresh_seconds = 5
"#;
    let warnings = validate_unknown_keys(toml_str);
    let fields: Vec<_> = warnings.iter().map(|w| w.field.as_str()).collect();
    assert_eq!(fields, vec!["dashboard", "dashboard.refresh_seconds"]);
}

#[test]
fn valid_config_has_no_unknown_keys() {
    let toml_str = EngineConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&toml_str).is_empty());
}

#[test]
fn unparseable_toml_yields_no_key_warnings() {
    assert!(validate_unknown_keys("[grid\ninterval_minutes = ").is_empty());
}

#[test]
fn far_away_keys_get_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely_unrelated_setting", &known).is_none());
    assert_eq!(
        suggest_correction("cache.tag_cache_capasity", &known).as_deref(),
        Some("cache.tag_cache_capacity")
    );
}

// ============================================================================
// Consistency Validation
// ============================================================================

#[test]
fn default_config_validates() {
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn partial_config_fills_defaults() {
    let config = EngineConfig::from_toml_str(
        r#"
[grid]
interval_minutes = 5

[evaluation]
allow_open_jobs = true
"#,
    )
    .unwrap();
    assert_eq!(config.grid.interval_minutes, 5);
    assert!(config.grid.auto_coarsen);
    assert!(config.evaluation.allow_open_jobs);
    assert_eq!(config.states, EngineConfig::default().states);
}

#[test]
fn zero_values_are_rejected() {
    let err = EngineConfig::from_toml_str(
        r#"
[grid]
interval_minutes = 0
max_ticks = 1

[evaluation]
batch_size = 0
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert_eq!(errors.len(), 3, "got {errors:?}");
            assert!(errors.iter().any(|e| e.contains("grid.interval_minutes")));
            assert!(errors.iter().any(|e| e.contains("grid.max_ticks")));
            assert!(errors.iter().any(|e| e.contains("evaluation.batch_size")));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn overlapping_state_groups_are_rejected() {
    let mut config = EngineConfig::default();
    config.states.tailback = vec![16, 1024];
    let Err(ConfigError::Validation(errors)) = config.validate() else {
        panic!("expected validation error");
    };
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("unplanned_down"));
    assert!(errors[0].contains("tailback"));
    assert!(errors[0].contains("1024"));
}

#[test]
fn empty_unplanned_down_group_is_rejected() {
    let mut config = EngineConfig::default();
    config.states.unplanned_down.clear();
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn wrong_value_type_is_a_parse_error() {
    let err = EngineConfig::from_toml_str("[grid]\ninterval_minutes = \"five\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

// ============================================================================
// Operating Ranges
// ============================================================================

#[test]
fn default_config_has_no_range_warnings() {
    assert!(check_operating_ranges(&EngineConfig::default()).is_empty());
}

#[test]
fn coarse_interval_warns() {
    let mut config = EngineConfig::default();
    config.grid.interval_minutes = 240;
    let warnings = check_operating_ranges(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "grid.interval_minutes");
}

#[test]
fn unknown_state_code_suggests_nearest_known_code() {
    let mut config = EngineConfig::default();
    config.states.unplanned_down = vec![1, 1000];
    config.states.lack = vec![20];
    let warnings = check_operating_ranges(&config);
    assert_eq!(warnings.len(), 2);

    let down = warnings
        .iter()
        .find(|w| w.field == "states.unplanned_down")
        .unwrap();
    assert_eq!(down.suggestion.as_deref(), Some("1024"));
    let lack = warnings.iter().find(|w| w.field == "states.lack").unwrap();
    assert_eq!(lack.suggestion.as_deref(), Some("16"));
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn load_from_file_round_trips() {
    let mut config = EngineConfig::default();
    config.grid.interval_minutes = 15;
    config.evaluation.batch_size = 250;
    config.storage.series_db_path = "/var/lib/oee/series".to_string();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

    let loaded = EngineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn load_from_file_reports_path_on_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[grid]\nmax_ticks = -3\n").unwrap();

    match EngineConfig::load_from_file(file.path()) {
        Err(ConfigError::Parse(path, _)) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}
