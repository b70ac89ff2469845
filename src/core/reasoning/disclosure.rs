//! Disclosure-violation rule.
//!
//! A dated node strictly before the contract date is a violation when its
//! diagnosis belongs to the target lineage (any diagnosis when no target
//! is given) and its look-back lies within at least one window.

use crate::core::graph::EventGraph;
use crate::core::options::InvestigationParams;
use crate::domain::{DisclosureFinding, Violation};

use super::{diagnosis_label, DiagnosisLineage};

pub fn evaluate(
    graph: &EventGraph,
    params: &InvestigationParams,
    lineage: Option<&DiagnosisLineage<'_>>,
) -> DisclosureFinding {
    let mut violations = Vec::new();

    for node in graph.dated_nodes() {
        let Some(date) = node.date() else { continue };
        if date >= params.contract_date {
            continue;
        }

        let event = &node.event;
        let relevant = match lineage {
            Some(lineage) => lineage.matches(event),
            None => event.diagnosis_canonical.is_some() || event.diagnosis_code.is_some(),
        };
        if !relevant {
            continue;
        }

        let days_before = (params.contract_date - date).num_days();
        let windows: Vec<String> = params
            .disclosure_windows
            .iter()
            .filter(|w| days_before <= w.days)
            .map(|w| w.label.clone())
            .collect();
        if windows.is_empty() {
            continue;
        }

        violations.push(Violation {
            node_id: node.id.clone(),
            date,
            hospital: event.hospital_label().map(str::to_string),
            details: format!(
                "{} recorded {} days before contract date {}",
                diagnosis_label(event),
                days_before,
                params.contract_date
            ),
            windows,
        });
    }

    DisclosureFinding {
        has_violation: !violations.is_empty(),
        violation_count: violations.len(),
        violations,
    }
}
