//! Field confidence scoring.
//!
//! All confidence heuristics live here. An event's confidence is the
//! weighted average of four signals:
//! - date: 1 when the date parsed, else 0
//! - hospital: the hospital match score
//! - diagnosis: the diagnosis match score
//! - code: 1 when the code agrees with the diagnosis, 0.5 when a code is
//!   present but uncorroborated, 0 when absent

use serde::{Deserialize, Serialize};

use crate::domain::RawEvent;

use super::options::ConfigError;

/// Relative weight of each confidence signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    #[serde(default = "default_date_weight")]
    pub date: f64,

    #[serde(default = "default_hospital_weight")]
    pub hospital: f64,

    #[serde(default = "default_diagnosis_weight")]
    pub diagnosis: f64,

    #[serde(default = "default_code_weight")]
    pub code: f64,
}

fn default_date_weight() -> f64 {
    0.30
}
fn default_hospital_weight() -> f64 {
    0.20
}
fn default_diagnosis_weight() -> f64 {
    0.35
}
fn default_code_weight() -> f64 {
    0.15
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            date: default_date_weight(),
            hospital: default_hospital_weight(),
            diagnosis: default_diagnosis_weight(),
            code: default_code_weight(),
        }
    }
}

impl ScoringWeights {
    /// Weights must be finite, non-negative, and sum to a positive value
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("date", self.date),
            ("hospital", self.hospital),
            ("diagnosis", self.diagnosis),
            ("code", self.code),
        ];

        if let Some((name, value)) = named.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Weights(format!(
                "{name} weight must be a non-negative number, got {value}"
            )));
        }
        if self.total() <= 0.0 {
            return Err(ConfigError::Weights("weights must not all be zero".to_string()));
        }

        Ok(())
    }

    fn total(&self) -> f64 {
        self.date + self.hospital + self.diagnosis + self.code
    }
}

/// Per-field outcomes of normalization for one event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventMatches {
    pub date_parsed: bool,
    pub hospital_score: f64,
    pub diagnosis_score: f64,
    /// The code resolved to the same diagnosis the text matched
    pub code_corroborated: bool,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ScoringWeights,
}

impl ConfidenceScorer {
    pub fn new(weights: ScoringWeights) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Field confidence in [0, 1]
    pub fn score(&self, raw: &RawEvent, matches: &EventMatches) -> f64 {
        let w = &self.weights;

        let date = if matches.date_parsed { 1.0 } else { 0.0 };
        let code = match (&raw.code_raw, matches.code_corroborated) {
            (None, _) => 0.0,
            (Some(_), true) => 1.0,
            (Some(_), false) => 0.5,
        };

        let weighted = w.date * date
            + w.hospital * unit(matches.hospital_score)
            + w.diagnosis * unit(matches.diagnosis_score)
            + w.code * code;

        (weighted / w.total()).clamp(0.0, 1.0)
    }
}

fn unit(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: Option<&str>) -> RawEvent {
        RawEvent {
            date: "2024-01-10".to_string(),
            hospital_raw: "서울대병원".to_string(),
            diagnosis_raw: "위암".to_string(),
            code_raw: code.map(str::to_string),
            source_offset: 0,
        }
    }

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(ScoringWeights::default()).unwrap()
    }

    #[test]
    fn test_perfect_event_scores_one() {
        let matches = EventMatches {
            date_parsed: true,
            hospital_score: 1.0,
            diagnosis_score: 1.0,
            code_corroborated: true,
        };
        let score = scorer().score(&raw(Some("C16.9")), &matches);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_code_corroboration_levels() {
        let matches = EventMatches {
            date_parsed: true,
            hospital_score: 1.0,
            diagnosis_score: 1.0,
            code_corroborated: false,
        };
        let s = scorer();
        let uncorroborated = s.score(&raw(Some("C16.9")), &matches);
        let absent = s.score(&raw(None), &matches);

        assert!((uncorroborated - 0.925).abs() < 1e-9);
        assert!((absent - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_matched_scores_zero() {
        let score = scorer().score(&raw(None), &EventMatches::default());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_out_of_range_inputs_clamped() {
        let matches = EventMatches {
            date_parsed: true,
            hospital_score: 7.0,
            diagnosis_score: f64::NAN,
            code_corroborated: false,
        };
        let score = scorer().score(&raw(None), &matches);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_weight_validation() {
        assert!(ScoringWeights::default().validate().is_ok());

        let negative = ScoringWeights {
            code: -0.1,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::Weights(_))));

        let zero = ScoringWeights {
            date: 0.0,
            hospital: 0.0,
            diagnosis: 0.0,
            code: 0.0,
        };
        assert!(ConfidenceScorer::new(zero).is_err());
    }
}
