//! Two-tier fuzzy matcher against the canonical dictionaries.
//!
//! Tier 1 is an exact or substring lookup on comparison keys. A dictionary
//! name found inside longer text must end where a source token ends, so
//! `폐렴구균` is not read as `폐렴`. Tier 2 falls back to normalized
//! Levenshtein similarity. Anything scoring below the
//! minimum is reported unmatched instead of being forced onto the nearest
//! entry: a wrong canonical hospital or diagnosis is worse than none.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::ReferenceData;

use super::code::{resolve_code, CodeResolution};
use super::key::{char_len, keyed_tokens, normalize_key};

const SCORE_EPSILON: f64 = 1e-9;

/// Matcher thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSettings {
    /// Default minimum similarity for a match (default: 0.6)
    #[serde(default = "default_min_match_score")]
    pub min_match_score: f64,

    /// Score reported for a tier-1 substring hit (default: 0.9)
    #[serde(default = "default_substring_score")]
    pub substring_score: f64,

    /// Diagnosis score when only the code identified the diagnosis (default: 0.8)
    #[serde(default = "default_code_match_score")]
    pub code_match_score: f64,
}

fn default_min_match_score() -> f64 {
    0.6
}
fn default_substring_score() -> f64 {
    0.9
}
fn default_code_match_score() -> f64 {
    0.8
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            min_match_score: default_min_match_score(),
            substring_score: default_substring_score(),
            code_match_score: default_code_match_score(),
        }
    }
}

/// Outcome of a hospital lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub canonical: Option<String>,
    pub score: f64,
}

impl MatchResult {
    pub fn unmatched() -> Self {
        Self {
            canonical: None,
            score: 0.0,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.canonical.is_some()
    }
}

/// Outcome of a diagnosis lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisMatch {
    pub canonical: Option<String>,
    pub code: Option<String>,
    pub score: f64,
}

impl DiagnosisMatch {
    pub fn unmatched() -> Self {
        Self {
            canonical: None,
            code: None,
            score: 0.0,
        }
    }
}

/// One searchable spelling of a dictionary entry
#[derive(Debug, Clone)]
struct IndexedName {
    key: String,
    key_len: usize,
    entry: usize,
}

/// Dictionary-backed normalizer for hospital and diagnosis names
#[derive(Debug, Clone)]
pub struct EntityNormalizer {
    reference: Arc<ReferenceData>,
    settings: MatchSettings,
    hospital_index: Vec<IndexedName>,
    diagnosis_index: Vec<IndexedName>,
}

impl EntityNormalizer {
    pub fn new(reference: Arc<ReferenceData>, settings: MatchSettings) -> Self {
        let hospital_index = build_index(
            reference
                .hospitals
                .iter()
                .map(|h| (h.name.as_str(), h.aliases.as_slice())),
            &reference.stopwords,
        );
        let diagnosis_index = build_index(
            reference
                .diagnoses
                .iter()
                .map(|d| (d.name.as_str(), d.aliases.as_slice())),
            &reference.stopwords,
        );

        Self {
            reference,
            settings,
            hospital_index,
            diagnosis_index,
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn match_hospital(&self, raw: &str) -> MatchResult {
        self.match_hospital_with(raw, self.settings.min_match_score)
    }

    pub fn match_hospital_with(&self, raw: &str, min_score: f64) -> MatchResult {
        let names: Vec<&str> = self.reference.hospitals.iter().map(|h| h.name.as_str()).collect();

        match self.best_match(raw, &self.hospital_index, &names, min_score) {
            Some((entry, score)) => MatchResult {
                canonical: Some(names[entry].to_string()),
                score,
            },
            None => MatchResult::unmatched(),
        }
    }

    pub fn match_diagnosis(&self, raw: &str) -> DiagnosisMatch {
        self.match_diagnosis_with(raw, self.settings.min_match_score)
    }

    pub fn match_diagnosis_with(&self, raw: &str, min_score: f64) -> DiagnosisMatch {
        let names: Vec<&str> = self.reference.diagnoses.iter().map(|d| d.name.as_str()).collect();

        match self.best_match(raw, &self.diagnosis_index, &names, min_score) {
            Some((entry, score)) => {
                let diagnosis = &self.reference.diagnoses[entry];
                DiagnosisMatch {
                    canonical: Some(diagnosis.name.clone()),
                    code: diagnosis.code.clone(),
                    score,
                }
            }
            None => DiagnosisMatch::unmatched(),
        }
    }

    /// Repair and look up a diagnostic code token
    pub fn resolve_code(&self, raw: &str) -> Option<CodeResolution> {
        resolve_code(raw, &self.reference)
    }

    /// Best entry for `raw` as `(entry index, score)`.
    ///
    /// Ties prefer the longer canonical name, then dictionary order.
    fn best_match(
        &self,
        raw: &str,
        index: &[IndexedName],
        names: &[&str],
        min_score: f64,
    ) -> Option<(usize, f64)> {
        let (raw_key, token_ends) = keyed_tokens(raw, &self.reference.stopwords);
        if raw_key.is_empty() || index.is_empty() {
            return None;
        }
        let raw_len = char_len(&raw_key);

        // Tier 1: exact key
        if let Some(hit) = pick_longest(index.iter().filter(|n| n.key == raw_key), names) {
            return Some((hit.entry, 1.0));
        }

        // Tier 1: substring, either the dictionary name inside noisy text, or
        // a fragment covering enough of the dictionary name
        let substring_hits = index.iter().filter(|n| {
            n.key_len >= 2
                && (contains_at_token_end(&raw_key, &token_ends, &n.key)
                    || (raw_len >= 2
                        && n.key.contains(&raw_key)
                        && raw_len as f64 / n.key_len as f64 >= min_score))
        });
        let best_substring = substring_hits.fold(None::<&IndexedName>, |best, candidate| {
            match best {
                Some(current) if !prefers(candidate, current, names) => Some(current),
                _ => Some(candidate),
            }
        });
        if let Some(hit) = best_substring {
            if self.settings.substring_score >= min_score {
                return Some((hit.entry, self.settings.substring_score));
            }
        }

        // Tier 2: edit-distance similarity
        let mut best: Option<(&IndexedName, f64)> = None;
        for candidate in index {
            let score = strsim::normalized_levenshtein(&raw_key, &candidate.key);
            best = match best {
                Some((current, current_score)) => {
                    if score > current_score + SCORE_EPSILON
                        || ((score - current_score).abs() <= SCORE_EPSILON
                            && char_len(names[candidate.entry]) > char_len(names[current.entry]))
                    {
                        Some((candidate, score))
                    } else {
                        Some((current, current_score))
                    }
                }
                None => Some((candidate, score)),
            };
        }

        best.filter(|(_, score)| *score + SCORE_EPSILON >= min_score)
            .map(|(hit, score)| (hit.entry, score))
    }
}

fn contains_at_token_end(key: &str, token_ends: &[usize], needle: &str) -> bool {
    key.match_indices(needle)
        .any(|(start, _)| token_ends.binary_search(&(start + needle.len())).is_ok())
}

fn build_index<'a>(
    entries: impl Iterator<Item = (&'a str, &'a [String])>,
    stopwords: &[String],
) -> Vec<IndexedName> {
    let mut index = Vec::new();

    for (entry, (name, aliases)) in entries.enumerate() {
        for spelling in std::iter::once(name).chain(aliases.iter().map(String::as_str)) {
            let key = normalize_key(spelling, stopwords);
            if key.is_empty() {
                continue;
            }
            index.push(IndexedName {
                key_len: char_len(&key),
                key,
                entry,
            });
        }
    }

    index
}

/// Whether `candidate` beats `current` as a substring hit: the longer
/// matched key first, then the longer canonical name.
fn prefers(candidate: &IndexedName, current: &IndexedName, names: &[&str]) -> bool {
    candidate.key_len > current.key_len
        || (candidate.key_len == current.key_len
            && char_len(names[candidate.entry]) > char_len(names[current.entry]))
}

fn pick_longest<'a>(
    hits: impl Iterator<Item = &'a IndexedName>,
    names: &[&str],
) -> Option<&'a IndexedName> {
    hits.fold(None::<&'a IndexedName>, |best, candidate| match best {
        Some(current) if char_len(names[candidate.entry]) <= char_len(names[current.entry]) => {
            Some(current)
        }
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> EntityNormalizer {
        let reference = ReferenceData::from_yaml_str(
            r#"
hospitals:
  - name: 서울대학교병원
    aliases: [서울대병원, Seoul National University Hospital]
  - name: 세브란스병원
  - name: 강남세브란스병원
  - name: 삼성서울병원
diagnoses:
  - name: 위암
    code: C16.9
    aliases: [gastric cancer]
  - name: 폐렴
    code: J18.9
  - name: 제2형 당뇨병
    code: E11.9
  - name: 협심증
    code: I20.9
"#,
        )
        .unwrap();
        EntityNormalizer::new(Arc::new(reference), MatchSettings::default())
    }

    #[test]
    fn test_exact_match_via_alias() {
        let n = normalizer();
        let result = n.match_hospital("서울대 병원");
        assert_eq!(result.canonical.as_deref(), Some("서울대학교병원"));
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_substring_prefers_longer_canonical() {
        let n = normalizer();
        let result = n.match_hospital("외래 강남세브란스병원 진료");
        assert_eq!(result.canonical.as_deref(), Some("강남세브란스병원"));
        assert_eq!(result.score, 0.9);
    }

    #[test]
    fn test_fuzzy_match_with_ocr_noise() {
        let n = normalizer();
        let result = n.match_diagnosis("gastric cancr");
        assert_eq!(result.canonical.as_deref(), Some("위암"));
        assert_eq!(result.code.as_deref(), Some("C16.9"));
        assert!(result.score > 0.9 && result.score < 1.0);
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let n = normalizer();
        let result = n.match_diagnosis("골절");
        assert_eq!(result, DiagnosisMatch::unmatched());

        let result = n.match_hospital("부산 동네 한의원");
        assert!(!result.is_matched());
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_empty_input_is_unmatched() {
        let n = normalizer();
        assert_eq!(n.match_hospital("   "), MatchResult::unmatched());
        assert_eq!(n.match_diagnosis(""), DiagnosisMatch::unmatched());
    }

    #[test]
    fn test_threshold_override() {
        let n = normalizer();
        // "세브란스" covers 4/6 of "세브란스병원"
        assert!(n.match_hospital_with("세브란스", 0.6).is_matched());
        assert!(!n.match_hospital_with("세브란스", 0.95).is_matched());
    }

    #[test]
    fn test_short_fragment_does_not_substring_match() {
        let n = normalizer();
        // "서울" is far too little of any hospital name
        assert!(!n.match_hospital("서울").is_matched());
    }

    #[test]
    fn test_substring_must_end_on_token_boundary() {
        let n = normalizer();
        // pneumococcal vaccination, not pneumonia
        assert_eq!(n.match_diagnosis("폐렴구균 예방접종"), DiagnosisMatch::unmatched());

        let result = n.match_diagnosis("지역사회획득 폐렴 의증");
        assert_eq!(result.canonical.as_deref(), Some("폐렴"));
        assert_eq!(result.score, 0.9);
    }

    #[test]
    fn test_resolve_code_through_normalizer() {
        let n = normalizer();
        let resolved = n.resolve_code("E1l.9").unwrap();
        assert_eq!(resolved.code, "E11.9");
        assert_eq!(resolved.canonical.as_deref(), Some("제2형 당뇨병"));
    }
}
