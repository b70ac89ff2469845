//! Date coverage audit.
//!
//! Compares the dates mentioned in a baseline text (a reviewer's report)
//! with those in a generated text, using the extractor's date battery.
//! Only years in 1950..=2100 count; anything else is treated as OCR noise.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::extract::DateParser;

const MIN_AUDIT_YEAR: i32 = 1950;
const MAX_AUDIT_YEAR: i32 = 2100;

/// Date overlap between a baseline and a generated text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCoverage {
    pub baseline_count: usize,
    pub generated_count: usize,
    pub matched: Vec<NaiveDate>,
    /// In the baseline but not generated
    pub missing: Vec<NaiveDate>,
    /// Generated but not in the baseline
    pub extra: Vec<NaiveDate>,
    pub coverage_percent: f64,
    pub precision_percent: f64,
}

/// Distinct plausible dates mentioned in `text`
pub fn collect_dates(parser: &DateParser, text: &str) -> BTreeSet<NaiveDate> {
    parser
        .find_all(text)
        .iter()
        .filter_map(|m| m.to_date())
        .filter(|d| (MIN_AUDIT_YEAR..=MAX_AUDIT_YEAR).contains(&d.year()))
        .collect()
}

pub fn date_coverage(parser: &DateParser, baseline: &str, generated: &str) -> DateCoverage {
    let baseline = collect_dates(parser, baseline);
    let generated = collect_dates(parser, generated);

    let matched: Vec<NaiveDate> = baseline.intersection(&generated).copied().collect();
    let missing: Vec<NaiveDate> = baseline.difference(&generated).copied().collect();
    let extra: Vec<NaiveDate> = generated.difference(&baseline).copied().collect();

    DateCoverage {
        baseline_count: baseline.len(),
        generated_count: generated.len(),
        coverage_percent: percent(matched.len(), baseline.len(), generated.is_empty()),
        precision_percent: percent(matched.len(), generated.len(), baseline.is_empty()),
        matched,
        missing,
        extra,
    }
}

/// `part / whole` as a percentage rounded to one decimal; an empty `whole`
/// is 100 only when the other side is empty too
fn percent(part: usize, whole: usize, other_empty: bool) -> f64 {
    if whole == 0 {
        return if other_empty { 100.0 } else { 0.0 };
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}
