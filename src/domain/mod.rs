//! Domain types for claimtrace.
//!
//! This module contains the core data structures:
//! - Event: raw and normalized clinical events, reason codes, node ids
//! - Reference: canonical hospital/diagnosis dictionaries
//! - Report: rule findings and the investigation report

pub mod event;
pub mod reference;
pub mod report;

// Re-export commonly used types
pub use event::{NodeId, NormalizedEvent, RawEvent, ReasonCode};
pub use reference::{
    code_stem, CodeCategory, DiagnosisEntry, HospitalEntry, ReferenceData, ReferenceError,
};
pub use report::{
    DateWindow, DisclosureFinding, DoctorShoppingFinding, InvestigationReport, ProgressivityFinding,
    ProgressivityStatus, ReportDetails, RiskLevel, RuleFinding, Violation,
};
