//! Case investigation facade.
//!
//! Runs one document through every stage:
//! extract -> normalize + score -> validate -> merge -> graph -> rules -> report.
//!
//! An `Investigator` is immutable once built and holds no per-case state, so
//! a single instance (or clones sharing the same `Arc<ReferenceData>`) can
//! serve concurrent cases.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::{
    code_stem, InvestigationReport, NormalizedEvent, RawEvent, ReasonCode, ReferenceData,
};
use crate::evidence::compute_case_id;
use crate::extract::FieldExtractor;
use crate::normalize::{EntityNormalizer, MatchSettings};

use super::graph::{EventGraph, RelationMapper};
use super::options::{ConfigError, InvestigationOptions, InvestigationParams};
use super::reasoning::ReasoningEngine;
use super::reporter::{generate_report, ReportContext};
use super::scorer::{ConfidenceScorer, EventMatches, ScoringWeights};
use super::validator::{merge_duplicates, CrossValidator, ValidationSettings};

/// Tunables of the normalization, scoring and validation stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    #[serde(default)]
    pub matching: MatchSettings,

    #[serde(default)]
    pub scoring: ScoringWeights,

    #[serde(default)]
    pub validation: ValidationSettings,
}

/// Investigates case documents against one set of reference data
#[derive(Debug, Clone)]
pub struct Investigator {
    reference: Arc<ReferenceData>,
    extractor: FieldExtractor,
    normalizer: EntityNormalizer,
    scorer: ConfidenceScorer,
    validation: ValidationSettings,
}

impl Investigator {
    pub fn new(reference: Arc<ReferenceData>, settings: EngineSettings) -> Result<Self, ConfigError> {
        let scorer = ConfidenceScorer::new(settings.scoring)?;
        settings.validation.validate()?;
        let matching = settings.matching;
        if !(matching.min_match_score > 0.0 && matching.min_match_score <= 1.0) {
            return Err(ConfigError::MinMatchScore(matching.min_match_score));
        }

        Ok(Self {
            normalizer: EntityNormalizer::new(Arc::clone(&reference), matching),
            reference,
            extractor: FieldExtractor::new(),
            scorer,
            validation: settings.validation,
        })
    }

    /// Investigator over the embedded reference data with default settings
    pub fn with_builtin_reference() -> anyhow::Result<Self> {
        let reference = Arc::new(ReferenceData::builtin()?);
        Ok(Self::new(reference, EngineSettings::default())?)
    }

    pub fn reference(&self) -> &Arc<ReferenceData> {
        &self.reference
    }

    pub fn normalizer(&self) -> &EntityNormalizer {
        &self.normalizer
    }

    pub fn extract(&self, text: &str) -> Vec<RawEvent> {
        self.extractor.extract(text)
    }

    /// Match a raw event against the dictionaries and score it
    pub fn normalize_event(&self, raw: RawEvent, min_match_score: f64) -> NormalizedEvent {
        let mut reasons = Vec::new();

        let date_normalized = if raw.has_date() {
            let parsed = self.extractor.date_parser().parse(&raw.date);
            if parsed.is_none() {
                reasons.push(ReasonCode::DateUnparseable);
            }
            parsed
        } else {
            reasons.push(ReasonCode::DateMissing);
            None
        };

        let hospital = self
            .normalizer
            .match_hospital_with(&raw.hospital_raw, min_match_score);
        if !hospital.is_matched() {
            reasons.push(ReasonCode::HospitalUnmatched);
        }

        let code = raw
            .code_raw
            .as_deref()
            .and_then(|token| match self.normalizer.resolve_code(token) {
                Some(resolution) => {
                    if resolution.remapped_from.is_some() {
                        reasons.push(ReasonCode::CodeRemapped);
                    }
                    Some(resolution)
                }
                None => {
                    reasons.push(ReasonCode::CodeInvalid);
                    None
                }
            });

        let mut diagnosis = self
            .normalizer
            .match_diagnosis_with(&raw.diagnosis_raw, min_match_score);
        let mut from_code = false;
        if diagnosis.canonical.is_none() {
            if let Some(canonical) = code.as_ref().and_then(|c| c.canonical.clone()) {
                diagnosis.canonical = Some(canonical);
                diagnosis.score = self.normalizer.settings().code_match_score;
                from_code = true;
                reasons.push(ReasonCode::DiagnosisFromCode);
            } else {
                reasons.push(ReasonCode::DiagnosisUnmatched);
            }
        }

        let code_corroborated = !from_code
            && match (&code, &diagnosis.canonical) {
                (Some(resolution), Some(canonical)) => {
                    resolution.canonical.as_deref() == Some(canonical.as_str())
                        || matches!(
                            (code_stem(&resolution.code), diagnosis.code.as_deref().and_then(code_stem)),
                            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
                        )
                }
                _ => false,
            };

        let field_confidence = self.scorer.score(
            &raw,
            &EventMatches {
                date_parsed: date_normalized.is_some(),
                hospital_score: hospital.score,
                diagnosis_score: diagnosis.score,
                code_corroborated,
            },
        );

        // The code as read takes precedence over the dictionary's code
        let diagnosis_code = code.map(|c| c.code).or(diagnosis.code);

        NormalizedEvent {
            raw,
            date_normalized,
            hospital_canonical: hospital.canonical,
            hospital_match_score: hospital.score,
            diagnosis_canonical: diagnosis.canonical,
            diagnosis_code,
            diagnosis_match_score: diagnosis.score,
            field_confidence,
            occurrences: 1,
            merged_offsets: Vec::new(),
            reasons,
        }
    }

    /// Extract, normalize, validate and merge the events of one document
    pub fn normalize_text(&self, text: &str, params: &InvestigationParams) -> Vec<NormalizedEvent> {
        let validator = CrossValidator::new(
            Arc::clone(&self.reference),
            self.validation.clone(),
            params.as_of,
        );

        let events: Vec<NormalizedEvent> = self
            .extract(text)
            .into_iter()
            .map(|raw| self.normalize_event(raw, params.min_match_score))
            .map(|event| validator.validate(event))
            .collect();

        let extracted = events.len();
        let merged = merge_duplicates(events);
        debug!(extracted, merged = merged.len(), "events normalized");
        merged
    }

    pub fn build_graph(&self, text: &str, params: &InvestigationParams) -> EventGraph {
        RelationMapper::new(params.window_days).map(self.normalize_text(text, params))
    }

    /// Investigate one document, using today's date when `asOf` is not set
    pub fn investigate_text(
        &self,
        case_id: Option<&str>,
        text: &str,
        contract_date: &str,
        options: &InvestigationOptions,
    ) -> Result<InvestigationReport, ConfigError> {
        self.investigate_at(case_id, text, contract_date, options, Local::now().date_naive())
    }

    /// Investigate one document with an explicit fallback for `asOf`
    #[instrument(skip(self, text, options), fields(bytes = text.len()))]
    pub fn investigate_at(
        &self,
        case_id: Option<&str>,
        text: &str,
        contract_date: &str,
        options: &InvestigationOptions,
        today: NaiveDate,
    ) -> Result<InvestigationReport, ConfigError> {
        let params = options.validate_at(contract_date, today)?;
        let case_id = match case_id {
            Some(id) => id.to_string(),
            None => compute_case_id(text, contract_date),
        };

        let graph = self.build_graph(text, &params);
        debug!(
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            undated = graph.undated_nodes().len(),
            "graph built"
        );

        let result = ReasoningEngine::new(&self.normalizer).investigate(&graph, &params);
        let report = generate_report(
            &result,
            &graph,
            &ReportContext {
                case_id: &case_id,
                source: Some(text),
            },
        );

        info!(
            case_id = %report.case_id,
            risk = %report.risk_level,
            findings = report.findings.iter().filter(|f| f.triggered).count(),
            "Investigation complete"
        );
        Ok(report)
    }
}
