//! Rule findings and the investigation report.
//!
//! Everything here serializes to the camelCase JSON handed to downstream
//! collaborators. Dates serialize as ISO `YYYY-MM-DD` strings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::evidence::Citation;

use super::event::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressivityStatus {
    #[serde(rename = "PROGRESSIVE/CHRONIC")]
    ProgressiveChronic,
    #[serde(rename = "ACUTE/ISOLATED")]
    AcuteIsolated,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ProgressivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressivityStatus::ProgressiveChronic => "PROGRESSIVE/CHRONIC",
            ProgressivityStatus::AcuteIsolated => "ACUTE/ISOLATED",
            ProgressivityStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ProgressivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-contract event inside at least one disclosure window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub node_id: NodeId,
    pub date: NaiveDate,
    pub hospital: Option<String>,
    pub details: String,
    /// Labels of every window containing the event
    pub windows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureFinding {
    pub has_violation: bool,
    pub violation_count: usize,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorShoppingFinding {
    pub is_suspicious: bool,
    pub max_hospitals: usize,
    pub threshold: usize,
    /// The first window reaching `max_hospitals`. Always serialized; `null`
    /// when no dated visit has a canonical hospital.
    pub window: Option<DateWindow>,
    pub node_ids: Vec<NodeId>,
    /// Same-hospital revisits inside the window
    pub repeat_visits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressivityFinding {
    pub status: ProgressivityStatus,
    pub diagnosis: Option<String>,
    pub timeline: Vec<NaiveDate>,
    pub node_ids: Vec<NodeId>,
}

impl Default for ProgressivityFinding {
    fn default() -> Self {
        Self {
            status: ProgressivityStatus::Unknown,
            diagnosis: None,
            timeline: Vec::new(),
            node_ids: Vec::new(),
        }
    }
}

/// Uniform summary of one rule's outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFinding {
    pub rule_id: String,
    pub triggered: bool,
    pub evidence: Vec<NodeId>,
    pub metrics: BTreeMap<String, serde_json::Value>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    pub disclosure: DisclosureFinding,
    pub doctor_shopping: DoctorShoppingFinding,
    pub progressivity: ProgressivityFinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationReport {
    pub case_id: String,
    pub risk_level: RiskLevel,
    pub summary: String,
    /// Mean field confidence over all graph nodes (0 for an empty graph)
    pub confidence: f64,
    pub details: ReportDetails,
    pub findings: Vec<RuleFinding>,
    /// Undated nodes that no rule could place on the timeline
    pub undated_evidence: Vec<NodeId>,
    pub citations: Vec<Citation>,
}

impl InvestigationReport {
    /// Every node id the report refers to, sorted and deduplicated
    pub fn cited_node_ids(&self) -> Vec<NodeId> {
        let d = &self.details;
        let mut ids: Vec<NodeId> = self
            .findings
            .iter()
            .flat_map(|f| f.evidence.iter().cloned())
            .chain(d.disclosure.violations.iter().map(|v| v.node_id.clone()))
            .chain(d.doctor_shopping.node_ids.iter().cloned())
            .chain(d.progressivity.node_ids.iter().cloned())
            .chain(self.undated_evidence.iter().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ProgressivityStatus::ProgressiveChronic).unwrap();
        assert_eq!(json, "\"PROGRESSIVE/CHRONIC\"");
        let parsed: ProgressivityStatus = serde_json::from_str("\"ACUTE/ISOLATED\"").unwrap();
        assert_eq!(parsed, ProgressivityStatus::AcuteIsolated);
    }

    #[test]
    fn test_risk_level_serialization() {
        assert_eq!(serde_json::to_string(&RiskLevel::Moderate).unwrap(), "\"MODERATE\"");
        assert_eq!(RiskLevel::High.to_string(), "HIGH");
    }

    #[test]
    fn test_shopping_finding_shape() {
        let finding = DoctorShoppingFinding {
            threshold: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["isSuspicious"], false);
        // present even without any visits
        assert!(json.as_object().unwrap().contains_key("window"));
        assert!(json["window"].is_null());
        assert_eq!(json["repeatVisits"], 0);
    }
}
