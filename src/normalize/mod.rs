//! Entity normalization against canonical reference vocabularies.
//!
//! - `key`: comparison keys (stopwords, whitespace, case)
//! - `code`: diagnostic code repair and deprecation remapping
//! - `matcher`: the two-tier hospital/diagnosis matcher

pub mod code;
pub mod key;
pub mod matcher;

pub use code::{repair_code, resolve_code, CodeResolution};
pub use key::normalize_key;
pub use matcher::{DiagnosisMatch, EntityNormalizer, MatchResult, MatchSettings};
