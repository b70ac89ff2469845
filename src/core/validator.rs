//! Cross-field consistency checks.
//!
//! The validator never drops an event. Contradictions lower the event's
//! confidence and leave a reason code behind; implausible dates turn the
//! event into undated evidence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{NormalizedEvent, ReasonCode, ReferenceData};

use super::options::ConfigError;

const CONFIDENCE_EPSILON: f64 = 1e-9;

/// Validation thresholds and penalties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSettings {
    /// Earliest plausible visit year (default: 1900)
    #[serde(default = "default_min_year")]
    pub min_year: i32,

    /// Days after `asOf` still accepted as plausible (default: 30)
    #[serde(default = "default_future_margin_days")]
    pub future_margin_days: i64,

    /// Confidence penalty for a code/diagnosis category mismatch (default: 0.2)
    #[serde(default = "default_mismatch_penalty")]
    pub mismatch_penalty: f64,

    /// Confidence penalty for an implausible date (default: 0.3)
    #[serde(default = "default_out_of_range_penalty")]
    pub out_of_range_penalty: f64,
}

fn default_min_year() -> i32 {
    1900
}
fn default_future_margin_days() -> i64 {
    30
}
fn default_mismatch_penalty() -> f64 {
    0.2
}
fn default_out_of_range_penalty() -> f64 {
    0.3
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_year: default_min_year(),
            future_margin_days: default_future_margin_days(),
            mismatch_penalty: default_mismatch_penalty(),
            out_of_range_penalty: default_out_of_range_penalty(),
        }
    }
}

impl ValidationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.future_margin_days < 0 {
            return Err(ConfigError::Validation(format!(
                "futureMarginDays must not be negative: {}",
                self.future_margin_days
            )));
        }
        for (name, penalty) in [
            ("mismatchPenalty", self.mismatch_penalty),
            ("outOfRangePenalty", self.out_of_range_penalty),
        ] {
            if !(0.0..=1.0).contains(&penalty) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be in [0, 1]: {penalty}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CrossValidator {
    reference: Arc<ReferenceData>,
    settings: ValidationSettings,
    latest_plausible: NaiveDate,
}

impl CrossValidator {
    pub fn new(reference: Arc<ReferenceData>, settings: ValidationSettings, as_of: NaiveDate) -> Self {
        let latest_plausible = as_of
            .checked_add_days(Days::new(settings.future_margin_days.max(0) as u64))
            .unwrap_or(NaiveDate::MAX);

        Self {
            reference,
            settings,
            latest_plausible,
        }
    }

    /// Check date plausibility and code/diagnosis category agreement
    pub fn validate(&self, event: NormalizedEvent) -> NormalizedEvent {
        let mut event = event;

        if let Some(date) = event.date_normalized {
            if date.year() < self.settings.min_year || date > self.latest_plausible {
                debug!(%date, "date outside plausible range");
                event.date_normalized = None;
                event = event.demoted(self.settings.out_of_range_penalty, ReasonCode::DateOutOfRange);
            }
        }

        if self.category_mismatch(&event) {
            event = event.demoted(self.settings.mismatch_penalty, ReasonCode::CodeDiagnosisMismatch);
        }

        event
    }

    fn category_mismatch(&self, event: &NormalizedEvent) -> bool {
        // A diagnosis taken from the code cannot disagree with it
        if event.has_reason(ReasonCode::DiagnosisFromCode) {
            return false;
        }

        let (Some(code), Some(canonical)) = (&event.diagnosis_code, &event.diagnosis_canonical) else {
            return false;
        };

        let code_category = self.reference.category_for_code(code);
        let diagnosis_category = self
            .reference
            .diagnosis(canonical)
            .and_then(|d| d.category.as_deref());

        match (code_category, diagnosis_category) {
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    /// Collapse events sharing date, canonical hospital and canonical
    /// diagnosis into the highest-confidence instance (ties: earliest
    /// offset). The survivor keeps the position of the group's first member.
    pub fn merge_duplicates(&self, events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
        merge_duplicates(events)
    }
}

type DuplicateKey = (NaiveDate, String, String);

fn duplicate_key(event: &NormalizedEvent) -> Option<DuplicateKey> {
    Some((
        event.date_normalized?,
        event.hospital_canonical.clone()?,
        event.diagnosis_canonical.clone()?,
    ))
}

pub fn merge_duplicates(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut merged: Vec<NormalizedEvent> = Vec::with_capacity(events.len());
    let mut slots: HashMap<DuplicateKey, usize> = HashMap::new();
    let before = events.len();

    for event in events {
        let Some(key) = duplicate_key(&event) else {
            merged.push(event);
            continue;
        };

        match slots.get(&key) {
            Some(&slot) => {
                let holder = merged[slot].clone();
                merged[slot] = absorb(holder, event);
            }
            None => {
                slots.insert(key, merged.len());
                merged.push(event);
            }
        }
    }

    if merged.len() != before {
        debug!(before, after = merged.len(), "merged duplicate events");
    }
    merged
}

fn absorb(a: NormalizedEvent, b: NormalizedEvent) -> NormalizedEvent {
    let b_wins = b.field_confidence > a.field_confidence + CONFIDENCE_EPSILON
        || ((b.field_confidence - a.field_confidence).abs() <= CONFIDENCE_EPSILON
            && b.raw.source_offset < a.raw.source_offset);
    let (mut keep, absorbed) = if b_wins { (b, a) } else { (a, b) };

    keep.occurrences += absorbed.occurrences;
    keep.merged_offsets.push(absorbed.raw.source_offset);
    keep.merged_offsets.extend(absorbed.merged_offsets);
    keep.merged_offsets.sort_unstable();
    keep.merged_offsets.dedup();
    keep.push_reason(ReasonCode::MergedDuplicates);
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawEvent;

    fn reference() -> Arc<ReferenceData> {
        Arc::new(
            ReferenceData::from_yaml_str(
                r#"
diagnoses:
  - { name: 위암, code: C16.9, category: neoplasm }
  - { name: 위염, code: K29.7, category: digestive }
codeCategories:
  - { from: C00, to: D48, category: neoplasm }
  - { from: K00, to: K93, category: digestive }
"#,
            )
            .unwrap(),
        )
    }

    fn validator() -> CrossValidator {
        CrossValidator::new(
            reference(),
            ValidationSettings::default(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    fn event(date: &str, offset: usize, confidence: f64) -> NormalizedEvent {
        NormalizedEvent {
            raw: RawEvent {
                date: date.to_string(),
                hospital_raw: "서울대병원".to_string(),
                diagnosis_raw: "위암".to_string(),
                code_raw: Some("C16.9".to_string()),
                source_offset: offset,
            },
            date_normalized: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            hospital_canonical: Some("서울대학교병원".to_string()),
            hospital_match_score: 1.0,
            diagnosis_canonical: Some("위암".to_string()),
            diagnosis_code: Some("C16.9".to_string()),
            diagnosis_match_score: 1.0,
            field_confidence: confidence,
            occurrences: 1,
            merged_offsets: Vec::new(),
            reasons: Vec::new(),
        }
    }

    #[test]
    fn test_consistent_event_untouched() {
        let original = event("2024-01-10", 0, 0.9);
        assert_eq!(validator().validate(original.clone()), original);
    }

    #[test]
    fn test_ancient_and_future_dates_become_undated() {
        let v = validator();

        let ancient = v.validate(event("1850-01-01", 0, 1.0));
        assert!(!ancient.is_dated());
        assert_eq!(ancient.raw.date, "1850-01-01");
        assert!(ancient.has_reason(ReasonCode::DateOutOfRange));
        assert!((ancient.field_confidence - 0.7).abs() < 1e-9);

        // asOf + 30 days is still plausible, one day later is not
        assert!(v.validate(event("2025-01-30", 0, 1.0)).is_dated());
        assert!(!v.validate(event("2025-01-31", 0, 1.0)).is_dated());
    }

    #[test]
    fn test_category_mismatch_penalized() {
        let mut mismatched = event("2024-01-10", 0, 0.9);
        mismatched.diagnosis_code = Some("K29.7".to_string());

        let result = validator().validate(mismatched);
        assert!(result.has_reason(ReasonCode::CodeDiagnosisMismatch));
        assert!((result.field_confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_code_derived_diagnosis_not_checked() {
        let mut derived = event("2024-01-10", 0, 0.9);
        derived.diagnosis_code = Some("K29.7".to_string());
        derived.push_reason(ReasonCode::DiagnosisFromCode);

        let result = validator().validate(derived);
        assert!(!result.has_reason(ReasonCode::CodeDiagnosisMismatch));
    }

    #[test]
    fn test_merge_keeps_highest_confidence() {
        let events = vec![
            event("2024-01-10", 0, 0.7),
            event("2024-02-01", 40, 0.9),
            event("2024-01-10", 80, 0.95),
            event("2024-01-10", 120, 0.6),
        ];

        let merged = validator().merge_duplicates(events);
        assert_eq!(merged.len(), 2);

        let survivor = &merged[0];
        assert_eq!(survivor.raw.source_offset, 80);
        assert_eq!(survivor.occurrences, 3);
        assert_eq!(survivor.merged_offsets, vec![0, 120]);
        assert!(survivor.has_reason(ReasonCode::MergedDuplicates));

        assert_eq!(merged[1].occurrences, 1);
        assert!(merged[1].reasons.is_empty());
    }

    #[test]
    fn test_merge_tie_prefers_earliest_offset() {
        let merged = merge_duplicates(vec![event("2024-01-10", 50, 0.8), event("2024-01-10", 10, 0.8)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].raw.source_offset, 10);
        assert_eq!(merged[0].merged_offsets, vec![50]);
    }

    #[test]
    fn test_events_missing_keys_never_merge() {
        let mut a = event("2024-01-10", 0, 0.8);
        let mut b = event("2024-01-10", 10, 0.8);
        a.hospital_canonical = None;
        b.hospital_canonical = None;

        assert_eq!(merge_duplicates(vec![a, b]).len(), 2);
    }
}
