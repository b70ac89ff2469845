//! Input limits and fail-fast configuration errors.

use std::path::Path;
use std::sync::Arc;

use claimtrace::core::{DisclosureWindow, ScoringWeights, ValidationSettings};
use claimtrace::domain::ReferenceData;
use claimtrace::{
    ConfigError, EngineSettings, InputLimits, InputViolation, InvestigationOptions, Investigator,
};

const CASE: &str = "2024-02-12 서울대학교병원 진단명: 위암 (C16.9)";

fn investigate(options: &InvestigationOptions) -> Result<(), ConfigError> {
    Investigator::with_builtin_reference()
        .unwrap()
        .investigate_text(None, CASE, "2024-03-01", options)
        .map(|_| ())
}

#[test]
fn test_default_input_limit_is_two_mebibytes() {
    let limits = InputLimits::default();
    assert_eq!(limits.max_input_bytes, 2 * 1024 * 1024);

    let at_limit = "a".repeat(2 * 1024 * 1024);
    assert!(limits.validate_input(&at_limit, None).is_ok());

    let over = "a".repeat(2 * 1024 * 1024 + 1);
    assert!(matches!(
        limits.validate_input(&over, None),
        Err(InputViolation::MaxInputBytes { .. })
    ));
}

#[test]
fn test_denylisted_paths_are_rejected() {
    let limits = InputLimits::default();
    assert!(matches!(
        limits.validate_input(CASE, Some(Path::new("cases/.env"))),
        Err(InputViolation::DenylistMatch { .. })
    ));
    assert!(limits.validate_input(CASE, Some(Path::new("cases/2024-001.txt"))).is_ok());
}

#[test]
fn test_limits_deserialize_with_defaults() {
    let limits: InputLimits = serde_yaml::from_str("maxInputBytes: 4096").unwrap();
    assert_eq!(limits.max_input_bytes, 4096);
    assert_eq!(limits.max_batch_cases, InputLimits::default().max_batch_cases);
}

#[test]
fn test_malformed_contract_date_fails_fast() {
    let result = Investigator::with_builtin_reference()
        .unwrap()
        .investigate_text(None, CASE, "2024-3-1x", &InvestigationOptions::default());
    assert!(matches!(
        result,
        Err(ConfigError::InvalidDate { field: "contractDate", .. })
    ));
}

#[test]
fn test_invalid_options_fail_fast() {
    let base = InvestigationOptions {
        as_of: Some("2024-12-31".to_string()),
        ..Default::default()
    };
    assert!(investigate(&base).is_ok());

    let cases = [
        InvestigationOptions {
            shopping_threshold: 0,
            ..base.clone()
        },
        InvestigationOptions {
            window_days: 0,
            ..base.clone()
        },
        InvestigationOptions {
            min_match_score: 0.0,
            ..base.clone()
        },
        InvestigationOptions {
            min_match_score: 1.5,
            ..base.clone()
        },
        InvestigationOptions {
            disclosure_windows: Vec::new(),
            ..base.clone()
        },
        InvestigationOptions {
            disclosure_windows: vec![DisclosureWindow::new("bad", -1)],
            ..base.clone()
        },
        InvestigationOptions {
            as_of: Some("31/12/2024".to_string()),
            ..base.clone()
        },
    ];

    for options in &cases {
        assert!(investigate(options).is_err(), "{options:?} should be rejected");
    }
}

#[test]
fn test_invalid_engine_settings_are_rejected() {
    let reference = Arc::new(ReferenceData::builtin().unwrap());

    let negative_weight = EngineSettings {
        scoring: ScoringWeights {
            hospital: -0.1,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Investigator::new(Arc::clone(&reference), negative_weight),
        Err(ConfigError::Weights(_))
    ));

    let bad_penalty = EngineSettings {
        validation: ValidationSettings {
            mismatch_penalty: 2.0,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Investigator::new(reference, bad_penalty),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_invalid_reference_data_is_rejected() {
    let malformed_range = "codeCategories:\n  - { from: Z99, to: A00, category: backwards }\n";
    assert!(ReferenceData::from_yaml_str(malformed_range).is_err());

    let empty_name = r#"{"hospitals": [{"name": "  "}]}"#;
    assert!(ReferenceData::from_json_str(empty_name).is_err());
}
