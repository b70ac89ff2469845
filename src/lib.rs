//! claimtrace - Investigative reasoning over OCR'd medical visit records
//!
//! Turns noisy, OCR-derived Korean medical-visit text into structured
//! clinical events and evaluates them for insurance-claim review.
//!
//! # Architecture
//!
//! Each document flows through a fixed chain of pure stages:
//! - Extraction finds dates, hospitals, diagnoses and codes
//! - Normalization maps them onto canonical reference entries
//! - Scoring and validation attach confidence and reason codes
//! - The relation mapper builds a time-ordered event graph
//! - Rules evaluate disclosure, doctor shopping and progressivity
//! - The reporter assembles risk level, findings and citations
//!
//! # Modules
//!
//! - `extract`: Syntactic field extraction (dates, hospitals, diagnoses, codes)
//! - `normalize`: Dictionary matching and code repair
//! - `core`: Scoring, validation, graph, rules, reporting, limits
//! - `domain`: Data structures (events, reference data, report)
//! - `evidence`: Source citations and case IDs
//! - `audit`: Date coverage between two texts
//! - `config`: Configuration discovery
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Investigate one document
//! claimtrace investigate --input case.txt --contract-date 2024-03-01 --target 위암
//!
//! # Investigate every document in a directory
//! claimtrace batch "cases/*.txt" --contract-date 2024-03-01
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod evidence;
pub mod extract;
pub mod normalize;

// Re-export main types at crate root for convenience
pub use core::{
    ConfigError, EngineSettings, EventGraph, InputLimits, InputViolation, InvestigationOptions,
    Investigator,
};
pub use domain::{InvestigationReport, NormalizedEvent, RawEvent, ReferenceData, RiskLevel};
pub use evidence::Citation;
pub use extract::FieldExtractor;
pub use normalize::EntityNormalizer;
