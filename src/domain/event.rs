//! Clinical event records for each pipeline stage.
//!
//! A `RawEvent` is what the field extractor recovers syntactically from the
//! source text. A `NormalizedEvent` is the same occurrence after dictionary
//! normalization and confidence scoring. Both are plain values: later stages
//! produce adjusted copies instead of mutating shared state.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One candidate clinical occurrence extracted from source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Date text exactly as matched (empty when the record carried no date)
    pub date: String,

    /// Hospital name span as matched (may be empty)
    pub hospital_raw: String,

    /// Diagnosis label span as matched (may be empty)
    pub diagnosis_raw: String,

    /// Diagnostic code token as matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_raw: Option<String>,

    /// Byte offset into the source text, for traceability
    pub source_offset: usize,
}

impl RawEvent {
    /// Whether the record carried any date text at all
    pub fn has_date(&self) -> bool {
        !self.date.trim().is_empty()
    }
}

/// Machine-readable explanation attached to a normalized event whenever a
/// stage demotes or transforms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// No date text was present in the record
    DateMissing,
    /// Date text was present but is not a valid calendar date
    DateUnparseable,
    /// Date parsed but lies outside the plausible range
    DateOutOfRange,
    /// No hospital dictionary entry scored above the threshold
    HospitalUnmatched,
    /// No diagnosis dictionary entry scored above the threshold
    DiagnosisUnmatched,
    /// Diagnosis text did not match; the canonical entry came from the code
    DiagnosisFromCode,
    /// Code category disagrees with the diagnosis category
    CodeDiagnosisMismatch,
    /// Code token could not be repaired into a valid code
    CodeInvalid,
    /// Deprecated code was replaced by its successor
    CodeRemapped,
    /// Duplicate events were merged into this one
    MergedDuplicates,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::DateMissing => "DATE_MISSING",
            ReasonCode::DateUnparseable => "DATE_UNPARSEABLE",
            ReasonCode::DateOutOfRange => "DATE_OUT_OF_RANGE",
            ReasonCode::HospitalUnmatched => "HOSPITAL_UNMATCHED",
            ReasonCode::DiagnosisUnmatched => "DIAGNOSIS_UNMATCHED",
            ReasonCode::DiagnosisFromCode => "DIAGNOSIS_FROM_CODE",
            ReasonCode::CodeDiagnosisMismatch => "CODE_DIAGNOSIS_MISMATCH",
            ReasonCode::CodeInvalid => "CODE_INVALID",
            ReasonCode::CodeRemapped => "CODE_REMAPPED",
            ReasonCode::MergedDuplicates => "MERGED_DUPLICATES",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw event enriched with canonical entities and a field confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    /// The extracted record this event was built from
    pub raw: RawEvent,

    /// Parsed calendar date, `None` when missing, unparseable or implausible
    pub date_normalized: Option<NaiveDate>,

    /// Canonical hospital name
    pub hospital_canonical: Option<String>,

    /// Similarity of the hospital match (0 when unmatched)
    pub hospital_match_score: f64,

    /// Canonical diagnosis name
    pub diagnosis_canonical: Option<String>,

    /// Diagnostic code (repaired raw code, else the dictionary code)
    pub diagnosis_code: Option<String>,

    /// Similarity of the diagnosis match (0 when unmatched)
    pub diagnosis_match_score: f64,

    /// Aggregate field confidence in [0, 1]
    pub field_confidence: f64,

    /// Number of source records this event stands for
    pub occurrences: usize,

    /// Source offsets of duplicates merged into this event
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_offsets: Vec<usize>,

    /// Why this event was demoted or transformed
    #[serde(default)]
    pub reasons: Vec<ReasonCode>,
}

impl NormalizedEvent {
    pub fn is_dated(&self) -> bool {
        self.date_normalized.is_some()
    }

    pub fn has_reason(&self, reason: ReasonCode) -> bool {
        self.reasons.contains(&reason)
    }

    /// Record a reason once, keeping insertion order
    pub fn push_reason(&mut self, reason: ReasonCode) {
        if !self.has_reason(reason) {
            self.reasons.push(reason);
        }
    }

    /// Copy with confidence lowered by `penalty` and the reason recorded
    pub fn demoted(mut self, penalty: f64, reason: ReasonCode) -> Self {
        self.field_confidence = (self.field_confidence - penalty).clamp(0.0, 1.0);
        self.push_reason(reason);
        self
    }

    /// Best available hospital label: canonical, else the trimmed raw span
    pub fn hospital_label(&self) -> Option<&str> {
        self.hospital_canonical.as_deref().or_else(|| {
            let raw = self.raw.hospital_raw.trim();
            (!raw.is_empty()).then_some(raw)
        })
    }
}

/// Stable identifier of a graph node (`ev-0001`, `ev-0002`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Build the id for the node at zero-based position `index`
    pub fn from_index(index: usize) -> Self {
        Self(format!("ev-{:04}", index + 1))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
