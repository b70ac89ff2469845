//! Investigation options and their validation.
//!
//! `InvestigationOptions` is the loosely-typed caller input (dates as
//! strings, everything defaulted). `validate` turns it into
//! `InvestigationParams`, failing fast with a `ConfigError` before any rule
//! runs.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named look-back window before the contract date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureWindow {
    pub label: String,
    pub days: i64,
}

impl DisclosureWindow {
    pub fn new(label: impl Into<String>, days: i64) -> Self {
        Self {
            label: label.into(),
            days,
        }
    }
}

/// Caller-supplied investigation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationOptions {
    /// Distinct hospitals within one window that count as doctor shopping (default: 3)
    #[serde(default = "default_shopping_threshold")]
    pub shopping_threshold: usize,

    /// Sliding window length in days (default: 30)
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Minimum similarity for hospital/diagnosis matches (default: 0.6)
    #[serde(default = "default_min_match_score")]
    pub min_match_score: f64,

    /// Look-back windows before the contract date (default: 3m, 1y, 2y, 5y)
    #[serde(default = "default_disclosure_windows")]
    pub disclosure_windows: Vec<DisclosureWindow>,

    /// Diagnosis under review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_diagnosis: Option<String>,

    /// Minimum span between occurrences for a chronic course (default: 14)
    #[serde(default = "default_min_progression_days")]
    pub min_progression_days: i64,

    /// Reference date for plausibility checks (default: today)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

fn default_shopping_threshold() -> usize {
    3
}
fn default_window_days() -> i64 {
    30
}
fn default_min_match_score() -> f64 {
    0.6
}
fn default_min_progression_days() -> i64 {
    14
}

fn default_disclosure_windows() -> Vec<DisclosureWindow> {
    vec![
        DisclosureWindow::new("3m", 90),
        DisclosureWindow::new("1y", 365),
        DisclosureWindow::new("2y", 730),
        DisclosureWindow::new("5y", 1825),
    ]
}

impl Default for InvestigationOptions {
    fn default() -> Self {
        Self {
            shopping_threshold: default_shopping_threshold(),
            window_days: default_window_days(),
            min_match_score: default_min_match_score(),
            disclosure_windows: default_disclosure_windows(),
            target_diagnosis: None,
            min_progression_days: default_min_progression_days(),
            as_of: None,
        }
    }
}

/// Validated parameters handed to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct InvestigationParams {
    pub contract_date: NaiveDate,
    pub as_of: NaiveDate,
    pub shopping_threshold: usize,
    pub window_days: i64,
    pub min_match_score: f64,
    pub disclosure_windows: Vec<DisclosureWindow>,
    pub target_diagnosis: Option<String>,
    pub min_progression_days: i64,
}

/// Invalid investigation configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid {field}: '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    #[error("Shopping threshold must be at least 1: {0}")]
    ShoppingThreshold(usize),

    #[error("Window days must be at least 1: {0}")]
    WindowDays(i64),

    #[error("Minimum match score must be in (0, 1]: {0}")]
    MinMatchScore(f64),

    #[error("At least one disclosure window is required")]
    NoDisclosureWindows,

    #[error("Disclosure window '{label}' must span at least 1 day: {days}")]
    DisclosureWindow { label: String, days: i64 },

    #[error("Minimum progression days must not be negative: {0}")]
    ProgressionDays(i64),

    #[error("Invalid scoring weights: {0}")]
    Weights(String),

    #[error("Invalid validation settings: {0}")]
    Validation(String),
}

impl InvestigationOptions {
    /// Validate against today's date as the default `asOf`
    pub fn validate(&self, contract_date: &str) -> Result<InvestigationParams, ConfigError> {
        self.validate_at(contract_date, Local::now().date_naive())
    }

    /// Validate with an explicit fallback for `asOf`
    pub fn validate_at(
        &self,
        contract_date: &str,
        today: NaiveDate,
    ) -> Result<InvestigationParams, ConfigError> {
        let contract_date = parse_iso_date("contractDate", contract_date)?;
        let as_of = match &self.as_of {
            Some(value) => parse_iso_date("asOf", value)?,
            None => today,
        };

        if self.shopping_threshold < 1 {
            return Err(ConfigError::ShoppingThreshold(self.shopping_threshold));
        }
        if self.window_days < 1 {
            return Err(ConfigError::WindowDays(self.window_days));
        }
        if !(self.min_match_score > 0.0 && self.min_match_score <= 1.0) {
            return Err(ConfigError::MinMatchScore(self.min_match_score));
        }
        if self.disclosure_windows.is_empty() {
            return Err(ConfigError::NoDisclosureWindows);
        }
        if let Some(window) = self.disclosure_windows.iter().find(|w| w.days < 1) {
            return Err(ConfigError::DisclosureWindow {
                label: window.label.clone(),
                days: window.days,
            });
        }
        if self.min_progression_days < 0 {
            return Err(ConfigError::ProgressionDays(self.min_progression_days));
        }

        let target_diagnosis = self
            .target_diagnosis
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(InvestigationParams {
            contract_date,
            as_of,
            shopping_threshold: self.shopping_threshold,
            window_days: self.window_days,
            min_match_score: self.min_match_score,
            disclosure_windows: self.disclosure_windows.clone(),
            target_diagnosis,
            min_progression_days: self.min_progression_days,
        })
    }
}

/// Strict `YYYY-MM-DD` parsing for caller-supplied dates
pub fn parse_iso_date(field: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = InvestigationOptions::default()
            .validate_at("2024-03-01", today())
            .unwrap();

        assert_eq!(params.shopping_threshold, 3);
        assert_eq!(params.window_days, 30);
        assert_eq!(params.min_progression_days, 14);
        assert_eq!(params.as_of, today());
        let days: Vec<i64> = params.disclosure_windows.iter().map(|w| w.days).collect();
        assert_eq!(days, vec![90, 365, 730, 1825]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: InvestigationOptions =
            serde_json::from_str(r#"{"shoppingThreshold": 2, "asOf": "2024-12-31"}"#).unwrap();
        assert_eq!(options.shopping_threshold, 2);
        assert_eq!(options.window_days, 30);

        let params = options.validate_at("2024-03-01", today()).unwrap();
        assert_eq!(params.as_of, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_malformed_dates_rejected() {
        let options = InvestigationOptions::default();
        assert!(matches!(
            options.validate_at("2024/03/01", today()),
            Err(ConfigError::InvalidDate { field: "contractDate", .. })
        ));
        assert!(matches!(
            options.validate_at("2024-02-30", today()),
            Err(ConfigError::InvalidDate { .. })
        ));

        let options = InvestigationOptions {
            as_of: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            options.validate_at("2024-03-01", today()),
            Err(ConfigError::InvalidDate { field: "asOf", .. })
        ));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let cases = vec![
            InvestigationOptions {
                shopping_threshold: 0,
                ..Default::default()
            },
            InvestigationOptions {
                window_days: 0,
                ..Default::default()
            },
            InvestigationOptions {
                min_match_score: 0.0,
                ..Default::default()
            },
            InvestigationOptions {
                min_match_score: 1.5,
                ..Default::default()
            },
            InvestigationOptions {
                min_progression_days: -1,
                ..Default::default()
            },
        ];

        for options in cases {
            assert!(options.validate_at("2024-03-01", today()).is_err());
        }
    }

    #[test]
    fn test_disclosure_windows_checked() {
        let empty = InvestigationOptions {
            disclosure_windows: Vec::new(),
            ..Default::default()
        };
        assert_eq!(
            empty.validate_at("2024-03-01", today()),
            Err(ConfigError::NoDisclosureWindows)
        );

        let negative = InvestigationOptions {
            disclosure_windows: vec![DisclosureWindow::new("bad", -5)],
            ..Default::default()
        };
        assert!(matches!(
            negative.validate_at("2024-03-01", today()),
            Err(ConfigError::DisclosureWindow { days: -5, .. })
        ));
    }

    #[test]
    fn test_blank_target_is_none() {
        let options = InvestigationOptions {
            target_diagnosis: Some("   ".to_string()),
            ..Default::default()
        };
        let params = options.validate_at("2024-03-01", today()).unwrap();
        assert_eq!(params.target_diagnosis, None);
    }
}
