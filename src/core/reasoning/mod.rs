//! Inference rules over the event graph.
//!
//! Each rule is an independent pure function of the graph and its
//! parameters:
//! - `disclosure`: pre-contract events inside a look-back window
//! - `shopping`: many distinct hospitals within a short window
//! - `progressivity`: single occurrence vs recurring course of a diagnosis
//!
//! `ReasoningEngine` only resolves the target diagnosis and runs the rules.

pub mod disclosure;
pub mod progressivity;
pub mod shopping;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::{
    code_stem, DisclosureFinding, DoctorShoppingFinding, NormalizedEvent, ProgressivityFinding,
    ReferenceData,
};
use crate::normalize::{repair_code, EntityNormalizer};

use super::graph::EventGraph;
use super::options::InvestigationParams;

/// The diagnosis under review, resolved against the dictionary when possible
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDiagnosis {
    pub text: String,
    pub canonical: Option<String>,
    pub code: Option<String>,
}

impl TargetDiagnosis {
    /// Canonical name, else the text as given
    pub fn label(&self) -> &str {
        self.canonical.as_deref().unwrap_or(&self.text)
    }
}

/// Decides whether an event belongs to the target diagnosis' lineage:
/// the same canonical entry, an entry listed as related, or a shared
/// 3-character code stem.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosisLineage<'a> {
    reference: &'a ReferenceData,
    target: &'a TargetDiagnosis,
}

impl<'a> DiagnosisLineage<'a> {
    pub fn new(reference: &'a ReferenceData, target: &'a TargetDiagnosis) -> Self {
        Self { reference, target }
    }

    pub fn target(&self) -> &TargetDiagnosis {
        self.target
    }

    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        event
            .diagnosis_canonical
            .as_deref()
            .is_some_and(|canonical| self.covers(canonical))
            || self.shares_code_stem(event)
    }

    /// Whether a canonical diagnosis belongs to the lineage
    pub fn covers(&self, canonical: &str) -> bool {
        match &self.target.canonical {
            Some(target) => self.reference.are_related(target, canonical),
            None => canonical.trim().eq_ignore_ascii_case(self.target.text.trim()),
        }
    }

    pub fn shares_code_stem(&self, event: &NormalizedEvent) -> bool {
        let target_stem = self.target.code.as_deref().and_then(code_stem);
        let event_stem = event.diagnosis_code.as_deref().and_then(code_stem);
        match (target_stem, event_stem) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

/// Outcome of all rules for one case
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningResult {
    pub contract_date: NaiveDate,
    pub target: Option<TargetDiagnosis>,
    pub disclosure: DisclosureFinding,
    pub doctor_shopping: DoctorShoppingFinding,
    pub progressivity: ProgressivityFinding,
}

pub struct ReasoningEngine<'a> {
    normalizer: &'a EntityNormalizer,
}

impl<'a> ReasoningEngine<'a> {
    pub fn new(normalizer: &'a EntityNormalizer) -> Self {
        Self { normalizer }
    }

    /// Resolve a target given either as a code (`C16`, `I20.9`) or a name
    pub fn resolve_target(&self, text: &str, min_match_score: f64) -> TargetDiagnosis {
        if repair_code(text).is_some() {
            if let Some(resolved) = self.normalizer.resolve_code(text) {
                return TargetDiagnosis {
                    text: text.to_string(),
                    canonical: resolved.canonical,
                    code: Some(resolved.code),
                };
            }
        }

        let matched = self.normalizer.match_diagnosis_with(text, min_match_score);
        TargetDiagnosis {
            text: text.to_string(),
            canonical: matched.canonical,
            code: matched.code,
        }
    }

    pub fn investigate(&self, graph: &EventGraph, params: &InvestigationParams) -> ReasoningResult {
        let target = params
            .target_diagnosis
            .as_deref()
            .map(|t| self.resolve_target(t, params.min_match_score));
        let lineage = target
            .as_ref()
            .map(|t| DiagnosisLineage::new(self.normalizer.reference(), t));

        let disclosure = disclosure::evaluate(graph, params, lineage.as_ref());
        let doctor_shopping =
            shopping::evaluate(graph, params.shopping_threshold, params.window_days);
        let progressivity =
            progressivity::evaluate(graph, lineage.as_ref(), params.min_progression_days);

        debug!(
            violations = disclosure.violation_count,
            max_hospitals = doctor_shopping.max_hospitals,
            status = %progressivity.status,
            "rules evaluated"
        );

        ReasoningResult {
            contract_date: params.contract_date,
            target,
            disclosure,
            doctor_shopping,
            progressivity,
        }
    }
}

/// Display name for an event's diagnosis
pub(crate) fn diagnosis_label(event: &NormalizedEvent) -> String {
    let name = event
        .diagnosis_canonical
        .clone()
        .or_else(|| {
            let raw = event.raw.diagnosis_raw.trim();
            (!raw.is_empty()).then(|| raw.to_string())
        })
        .unwrap_or_else(|| "unspecified diagnosis".to_string());

    match &event.diagnosis_code {
        Some(code) => format!("{name} ({code})"),
        None => name,
    }
}
