//! Canonical reference vocabularies.
//!
//! `ReferenceData` is loaded once by the caller and injected into the
//! normalizer, validator and reasoning engine. It is read-only after loading
//! and is shared across concurrent case evaluations behind an `Arc`.
//!
//! File schema (YAML or JSON):
//!
//! ```yaml
//! hospitals:
//!   - name: 서울대학교병원
//!     aliases: [서울대병원, Seoul National University Hospital]
//! diagnoses:
//!   - name: 위암
//!     code: C16.9
//!     category: neoplasm
//!     aliases: [gastric cancer]
//!     related: []
//! codeCategories:
//!   - { from: C00, to: D48, category: neoplasm }
//! deprecatedCodes:
//!   K29.8: K29.7
//! stopwords: [의료법인, the]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_REFERENCE: &str = include_str!("../../data/reference.yaml");

/// A canonical hospital with its known spellings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A canonical diagnosis with its code and related conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Canonical names of medically related diagnoses
    #[serde(default)]
    pub related: Vec<String>,
}

/// Inclusive range of 3-character code stems belonging to one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCategory {
    pub from: String,
    pub to: String,
    pub category: String,
}

impl CodeCategory {
    fn contains(&self, stem: &str) -> bool {
        self.from.as_str() <= stem && stem <= self.to.as_str()
    }
}

/// Errors raised while loading or validating reference data
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to read reference data {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse reference data as {format}: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Invalid reference data: {0}")]
    Invalid(String),
}

/// Canonical dictionaries used across the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceData {
    #[serde(default)]
    pub hospitals: Vec<HospitalEntry>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisEntry>,
    #[serde(default)]
    pub code_categories: Vec<CodeCategory>,
    /// Deprecated code -> replacement code
    #[serde(default)]
    pub deprecated_codes: BTreeMap<String, String>,
    /// Tokens stripped before comparing names
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,
}

fn default_stopwords() -> Vec<String> {
    ["의료법인", "재단법인", "학교법인", "사단법인", "(주)", "주식회사", "the", "of"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ReferenceData {
    /// The dictionary bundled with the crate
    pub fn builtin() -> Result<Self, ReferenceError> {
        Self::from_yaml_str(BUILTIN_REFERENCE)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ReferenceError> {
        let data: Self = serde_yaml::from_str(content).map_err(|e| ReferenceError::Parse {
            format: "YAML",
            message: e.to_string(),
        })?;
        data.validate()?;
        Ok(data)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ReferenceError> {
        let data: Self = serde_json::from_str(content).map_err(|e| ReferenceError::Parse {
            format: "JSON",
            message: e.to_string(),
        })?;
        data.validate()?;
        Ok(data)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let content = std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Reject entries that would make matching ambiguous or undefined
    pub fn validate(&self) -> Result<(), ReferenceError> {
        for hospital in &self.hospitals {
            if hospital.name.trim().is_empty() {
                return Err(ReferenceError::Invalid("hospital with empty name".to_string()));
            }
        }

        for diagnosis in &self.diagnoses {
            if diagnosis.name.trim().is_empty() {
                return Err(ReferenceError::Invalid("diagnosis with empty name".to_string()));
            }
        }

        for range in &self.code_categories {
            if !is_code_stem(&range.from) || !is_code_stem(&range.to) || range.from > range.to {
                return Err(ReferenceError::Invalid(format!(
                    "code category '{}' has malformed range {}..{}",
                    range.category, range.from, range.to
                )));
            }
        }

        Ok(())
    }

    pub fn diagnosis(&self, canonical: &str) -> Option<&DiagnosisEntry> {
        self.diagnoses.iter().find(|d| d.name == canonical)
    }

    /// Look up a diagnosis by code: exact code first, then the 3-character stem
    pub fn diagnosis_by_code(&self, code: &str) -> Option<&DiagnosisEntry> {
        let exact = self.diagnoses.iter().find(|d| {
            d.code
                .as_deref()
                .map(|c| c.eq_ignore_ascii_case(code))
                .unwrap_or(false)
        });

        exact.or_else(|| {
            let stem = code_stem(code)?;
            self.diagnoses
                .iter()
                .find(|d| d.code.as_deref().and_then(code_stem) == Some(stem))
        })
    }

    /// Category for a code according to the code category table
    pub fn category_for_code(&self, code: &str) -> Option<&str> {
        let stem = code_stem(code)?.to_ascii_uppercase();
        self.code_categories
            .iter()
            .find(|range| range.contains(&stem))
            .map(|range| range.category.as_str())
    }

    /// Replacement for a deprecated code
    pub fn replacement_code(&self, code: &str) -> Option<&str> {
        self.deprecated_codes.get(code).map(String::as_str)
    }

    /// Whether two canonical diagnoses denote the same or a related condition.
    ///
    /// Related means: identical names, listed in either entry's `related`
    /// list, or sharing a 3-character code stem.
    pub fn are_related(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }

        let (Some(left), Some(right)) = (self.diagnosis(a), self.diagnosis(b)) else {
            return false;
        };

        if left.related.iter().any(|r| r == b) || right.related.iter().any(|r| r == a) {
            return true;
        }

        match (
            left.code.as_deref().and_then(code_stem),
            right.code.as_deref().and_then(code_stem),
        ) {
            (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
            _ => false,
        }
    }
}

/// First three characters of a code (`C16.9` -> `C16`)
pub fn code_stem(code: &str) -> Option<&str> {
    let stem = code.get(..3)?;
    is_code_stem(stem).then_some(stem)
}

fn is_code_stem(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
}
