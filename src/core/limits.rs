//! Input limits for case documents.
//!
//! The core has no cancellation, so callers bound the work up front:
//! - Input size per document
//! - Number of documents per batch
//! - Denylist patterns (to avoid reading secrets through a batch glob)

use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input limits applied before a case is investigated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputLimits {
    /// Maximum input size in bytes (default: 2 MiB)
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Maximum documents per batch (default: 1000)
    #[serde(default = "default_max_batch_cases")]
    pub max_batch_cases: usize,

    /// Glob patterns to reject (matching files are never read)
    #[serde(default = "default_denylist")]
    pub denylist_patterns: Vec<String>,
}

fn default_max_input_bytes() -> u64 {
    2 * 1024 * 1024
}
fn default_max_batch_cases() -> usize {
    1000
}

fn default_denylist() -> Vec<String> {
    vec![
        "**/.env*".to_string(),
        "**/secrets*".to_string(),
        "**/*credential*".to_string(),
        "**/*.pem".to_string(),
        "**/*.key".to_string(),
    ]
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: default_max_input_bytes(),
            max_batch_cases: default_max_batch_cases(),
            denylist_patterns: default_denylist(),
        }
    }
}

impl InputLimits {
    /// Check if a path matches any denylist pattern
    pub fn is_denylisted(&self, path: &str) -> bool {
        self.denylist_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|pattern| pattern.matches(path))
    }

    /// Validate a document against the size limit and denylist
    pub fn validate_input(&self, input: &str, source_path: Option<&Path>) -> Result<(), InputViolation> {
        self.validate_size(input.len() as u64)?;

        if let Some(path) = source_path {
            self.validate_path(path)?;
        }

        Ok(())
    }

    /// Size check alone, for a document not yet read (file metadata)
    pub fn validate_size(&self, size: u64) -> Result<(), InputViolation> {
        if size > self.max_input_bytes {
            return Err(InputViolation::MaxInputBytes {
                actual: size,
                limit: self.max_input_bytes,
            });
        }
        Ok(())
    }

    pub fn validate_path(&self, path: &Path) -> Result<(), InputViolation> {
        let path_str = path.to_string_lossy();
        if self.is_denylisted(&path_str) {
            return Err(InputViolation::DenylistMatch {
                path: path_str.to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_batch(&self, cases: usize) -> Result<(), InputViolation> {
        if cases > self.max_batch_cases {
            return Err(InputViolation::MaxBatchCases {
                actual: cases,
                limit: self.max_batch_cases,
            });
        }
        Ok(())
    }
}

/// Input limit violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputViolation {
    #[error("Maximum input bytes exceeded: {actual} > {limit}")]
    MaxInputBytes { actual: u64, limit: u64 },

    #[error("Maximum batch cases exceeded: {actual} > {limit}")]
    MaxBatchCases { actual: usize, limit: usize },

    #[error("Path matches denylist pattern: {path}")]
    DenylistMatch { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = InputLimits::default();
        assert_eq!(limits.max_input_bytes, 2 * 1024 * 1024);
        assert_eq!(limits.max_batch_cases, 1000);
    }

    #[test]
    fn test_denylist_matching() {
        let limits = InputLimits::default();

        assert!(limits.is_denylisted(".env"));
        assert!(limits.is_denylisted("config/secrets.json"));
        assert!(limits.is_denylisted("certs/server.pem"));

        assert!(!limits.is_denylisted("cases/2024-001.txt"));
    }

    #[test]
    fn test_input_size_boundary() {
        let limits = InputLimits {
            max_input_bytes: 6,
            ..Default::default()
        };

        // two Hangul syllables are six bytes
        assert!(limits.validate_input("위암", None).is_ok());
        assert!(matches!(
            limits.validate_input("위암 ", None),
            Err(InputViolation::MaxInputBytes { actual: 7, limit: 6 })
        ));
    }

    #[test]
    fn test_size_check_without_content() {
        let limits = InputLimits::default();
        assert!(limits.validate_size(2 * 1024 * 1024).is_ok());
        assert_eq!(
            limits.validate_size(u64::MAX),
            Err(InputViolation::MaxInputBytes {
                actual: u64::MAX,
                limit: 2 * 1024 * 1024,
            })
        );
    }

    #[test]
    fn test_batch_limit() {
        let limits = InputLimits {
            max_batch_cases: 2,
            ..Default::default()
        };
        assert!(limits.validate_batch(2).is_ok());
        assert!(limits.validate_batch(3).is_err());
    }
}
