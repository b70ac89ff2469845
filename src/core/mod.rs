//! Core investigation logic.
//!
//! This module contains:
//! - Options: caller options and their validation
//! - Scorer: per-event field confidence
//! - Validator: plausibility, consistency and duplicate merging
//! - Graph: the time-ordered event graph
//! - Reasoning: disclosure, doctor-shopping and progressivity rules
//! - Reporter: risk level, findings and citations
//! - Investigator: the end-to-end facade
//! - Limits: input size and batch limits

pub mod graph;
pub mod investigator;
pub mod limits;
pub mod options;
pub mod reasoning;
pub mod reporter;
pub mod scorer;
pub mod validator;

// Re-export commonly used types
pub use graph::{Edge, EdgeKind, EventGraph, Node, RelationMapper};
pub use investigator::{EngineSettings, Investigator};
pub use limits::{InputLimits, InputViolation};
pub use options::{ConfigError, DisclosureWindow, InvestigationOptions, InvestigationParams};
pub use reasoning::{ReasoningEngine, ReasoningResult, TargetDiagnosis};
pub use reporter::{generate_report, ReportContext};
pub use scorer::{ConfidenceScorer, EventMatches, ScoringWeights};
pub use validator::{merge_duplicates, CrossValidator, ValidationSettings};
