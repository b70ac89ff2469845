//! Investigation report assembly.
//!
//! Risk levels:
//! - HIGH: any disclosure violation
//! - MODERATE: suspicious doctor shopping or a progressive/chronic course
//! - LOW: everything else, including an empty graph

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::domain::{
    InvestigationReport, NodeId, ProgressivityStatus, ReportDetails, RiskLevel, RuleFinding,
};
use crate::evidence::{cite, Citation};

use super::graph::EventGraph;
use super::reasoning::ReasoningResult;

pub const DISCLOSURE_RULE: &str = "DISCLOSURE_VIOLATION";
pub const DOCTOR_SHOPPING_RULE: &str = "DOCTOR_SHOPPING";
pub const PROGRESSIVITY_RULE: &str = "DISEASE_PROGRESSIVITY";

/// Identity and optional source text of the case being reported
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub case_id: &'a str,
    /// Source text; citations are only produced when present
    pub source: Option<&'a str>,
}

pub fn risk_level(result: &ReasoningResult) -> RiskLevel {
    if result.disclosure.has_violation {
        RiskLevel::High
    } else if result.doctor_shopping.is_suspicious
        || result.progressivity.status == ProgressivityStatus::ProgressiveChronic
    {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

pub fn generate_report(
    result: &ReasoningResult,
    graph: &EventGraph,
    ctx: &ReportContext<'_>,
) -> InvestigationReport {
    let risk = risk_level(result);
    let findings = vec![
        disclosure_finding(result),
        shopping_finding(result, graph.window_days()),
        progressivity_finding(result),
    ];

    let undated_evidence: Vec<NodeId> = graph
        .undated_nodes()
        .iter()
        .filter(|n| !graph.is_linked(&n.id))
        .map(|n| n.id.clone())
        .collect();

    let mut report = InvestigationReport {
        case_id: ctx.case_id.to_string(),
        risk_level: risk,
        summary: summary(risk, result, graph),
        confidence: mean_confidence(graph),
        details: ReportDetails {
            disclosure: result.disclosure.clone(),
            doctor_shopping: result.doctor_shopping.clone(),
            progressivity: result.progressivity.clone(),
        },
        findings,
        undated_evidence,
        citations: Vec::new(),
    };

    if let Some(source) = ctx.source {
        report.citations = citations(&report, graph, source);
    }

    report
}

fn citations(report: &InvestigationReport, graph: &EventGraph, source: &str) -> Vec<Citation> {
    report
        .cited_node_ids()
        .iter()
        .filter_map(|id| graph.node(id))
        .map(|node| cite(source, node))
        .collect()
}

fn mean_confidence(graph: &EventGraph) -> f64 {
    let nodes = graph.nodes();
    if nodes.is_empty() {
        return 0.0;
    }
    let total: f64 = nodes.iter().map(|n| n.event.field_confidence).sum();
    round3(total / nodes.len() as f64)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn summary(risk: RiskLevel, result: &ReasoningResult, graph: &EventGraph) -> String {
    let subject = result
        .target
        .as_ref()
        .map(|t| format!(" for {}", t.label()))
        .unwrap_or_default();

    format!(
        "{risk} risk{subject}: {} pre-contract disclosure violation(s) before {}; up to {} distinct hospital(s) within {} days (threshold {}); progressivity {}; {} event(s), {} undated.",
        result.disclosure.violation_count,
        result.contract_date,
        result.doctor_shopping.max_hospitals,
        graph.window_days(),
        result.doctor_shopping.threshold,
        result.progressivity.status,
        graph.nodes().len(),
        graph.undated_nodes().len(),
    )
}

fn metrics<const N: usize>(entries: [(&str, Value); N]) -> BTreeMap<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn disclosure_finding(result: &ReasoningResult) -> RuleFinding {
    let disclosure = &result.disclosure;

    let mut per_window: BTreeMap<&str, usize> = BTreeMap::new();
    for violation in &disclosure.violations {
        for window in &violation.windows {
            *per_window.entry(window.as_str()).or_default() += 1;
        }
    }

    let message = if disclosure.has_violation {
        format!(
            "{} event(s) recorded before the contract date fall inside a disclosure window",
            disclosure.violation_count
        )
    } else {
        "No pre-contract event falls inside a disclosure window".to_string()
    };

    RuleFinding {
        rule_id: DISCLOSURE_RULE.to_string(),
        triggered: disclosure.has_violation,
        evidence: disclosure.violations.iter().map(|v| v.node_id.clone()).collect(),
        metrics: metrics([
            ("contractDate", json!(result.contract_date)),
            ("violationCount", json!(disclosure.violation_count)),
            ("violationsPerWindow", json!(per_window)),
            (
                "targetDiagnosis",
                json!(result.target.as_ref().map(|t| t.label())),
            ),
        ]),
        message,
    }
}

fn shopping_finding(result: &ReasoningResult, window_days: i64) -> RuleFinding {
    let shopping = &result.doctor_shopping;

    let message = match (&shopping.window, shopping.is_suspicious) {
        (Some(window), true) => format!(
            "{} distinct hospitals visited between {} and {}",
            shopping.max_hospitals, window.start, window.end
        ),
        _ => format!(
            "At most {} distinct hospital(s) within any {}-day window",
            shopping.max_hospitals, window_days
        ),
    };

    RuleFinding {
        rule_id: DOCTOR_SHOPPING_RULE.to_string(),
        triggered: shopping.is_suspicious,
        evidence: if shopping.is_suspicious {
            shopping.node_ids.clone()
        } else {
            Vec::new()
        },
        metrics: metrics([
            ("maxHospitals", json!(shopping.max_hospitals)),
            ("repeatVisits", json!(shopping.repeat_visits)),
            ("threshold", json!(shopping.threshold)),
            ("windowDays", json!(window_days)),
        ]),
        message,
    }
}

fn progressivity_finding(result: &ReasoningResult) -> RuleFinding {
    let progressivity = &result.progressivity;
    let span_days = match (progressivity.timeline.first(), progressivity.timeline.last()) {
        (Some(first), Some(last)) => (*last - *first).num_days(),
        _ => 0,
    };
    let diagnosis = progressivity
        .diagnosis
        .as_deref()
        .unwrap_or("no diagnosis");

    let message = match progressivity.status {
        ProgressivityStatus::Unknown => format!("No dated occurrence of {diagnosis}"),
        ProgressivityStatus::AcuteIsolated => format!(
            "{diagnosis}: {} occurrence(s) within {span_days} days, acute or isolated",
            progressivity.timeline.len()
        ),
        ProgressivityStatus::ProgressiveChronic => format!(
            "{diagnosis}: {} occurrences spanning {span_days} days, recurring course",
            progressivity.timeline.len()
        ),
    };

    RuleFinding {
        rule_id: PROGRESSIVITY_RULE.to_string(),
        triggered: progressivity.status == ProgressivityStatus::ProgressiveChronic,
        evidence: progressivity.node_ids.clone(),
        metrics: metrics([
            ("occurrences", json!(progressivity.timeline.len())),
            ("spanDays", json!(span_days)),
            ("status", json!(progressivity.status)),
        ]),
        message,
    }
}
