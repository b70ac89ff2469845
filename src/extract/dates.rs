//! Date pattern battery.
//!
//! Recognized shapes:
//! - `2024-01-10`, `2024.01.10`, `2024/1/10`, `2024. 01. 10` (optionally `14:30[:00]`)
//! - `20240110`
//! - `2024년 1월 10일` (optionally `14:30` or `14시 30분`)
//! - `Jan 10, 2024`, `January 10th 2024`, `10 Jan 2024`

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::Serialize;

const ISO_PATTERN: &str = r"(?P<y>\d{4})\s?[-./]\s?(?P<m>\d{1,2})\s?[-./]\s?(?P<d>\d{1,2})(?:(?:\s+|T)\d{1,2}:\d{2}(?::\d{2})?)?";
const COMPACT_PATTERN: &str = r"(?P<y>(?:19|20)\d{2})(?P<m>0[1-9]|1[0-2])(?P<d>0[1-9]|[12]\d|3[01])";
const KOREAN_PATTERN: &str = r"(?P<y>\d{4})\s*년\s*(?P<m>\d{1,2})\s*월\s*(?P<d>\d{1,2})\s*일(?:\s*(?:\d{1,2}:\d{2}(?::\d{2})?|\d{1,2}\s*시(?:\s*\d{1,2}\s*분)?))?";
const MONTH_NAMES: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

/// Which pattern produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    Iso,
    Compact,
    KoreanLong,
    EnglishMonthFirst,
    EnglishDayFirst,
}

/// A syntactic date match; the components are not validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub format: DateFormat,
}

impl DateMatch {
    /// Calendar date, `None` for impossible dates such as `2024-02-30`
    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Compiled date patterns
#[derive(Debug, Clone)]
pub struct DateParser {
    patterns: Vec<(DateFormat, Regex)>,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DateParser {
    pub fn new() -> Self {
        let month_first = format!(
            r"(?i)\b(?P<mon>{MONTH_NAMES})\b\.?\s+(?P<d>\d{{1,2}})(?:st|nd|rd|th)?,?\s+(?P<y>\d{{4}})(?:,?\s+\d{{1,2}}:\d{{2}}(?::\d{{2}})?)?"
        );
        let day_first = format!(
            r"(?i)\b(?P<d>\d{{1,2}})(?:st|nd|rd|th)?\s+(?P<mon>{MONTH_NAMES})\b\.?,?\s+(?P<y>\d{{4}})"
        );

        let patterns = vec![
            (DateFormat::Iso, compile(ISO_PATTERN)),
            (DateFormat::Compact, compile(COMPACT_PATTERN)),
            (DateFormat::KoreanLong, compile(KOREAN_PATTERN)),
            (DateFormat::EnglishMonthFirst, compile(&month_first)),
            (DateFormat::EnglishDayFirst, compile(&day_first)),
        ];

        Self { patterns }
    }

    /// Every date match in `text`, ordered by position.
    ///
    /// Matches from different patterns may overlap; all are kept.
    pub fn find_all(&self, text: &str) -> Vec<DateMatch> {
        let mut found = Vec::new();

        for (format, regex) in &self.patterns {
            for caps in regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                if !digit_bounded(text, whole.start(), whole.end()) {
                    continue;
                }
                if let Some((year, month, day)) = components(&caps) {
                    found.push(DateMatch {
                        text: whole.as_str().to_string(),
                        start: whole.start(),
                        end: whole.end(),
                        year,
                        month,
                        day,
                        format: *format,
                    });
                }
            }
        }

        found.sort_by_key(|m| (m.start, m.end));
        found
    }

    /// Parse a raw date string with the same battery
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        self.find_all(raw).iter().find_map(DateMatch::to_date)
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("date pattern must compile")
}

/// Reject matches glued to further digits (`12024-01-10`, `2024-01-101`)
fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map(|c| c.is_ascii_digit()).unwrap_or(false)
        && !after.map(|c| c.is_ascii_digit()).unwrap_or(false)
}

fn components(caps: &Captures<'_>) -> Option<(i32, u32, u32)> {
    let year = caps.name("y")?.as_str().parse().ok()?;
    let day = caps.name("d")?.as_str().parse().ok()?;
    let month = match caps.name("m") {
        Some(m) => m.as_str().parse().ok()?,
        None => month_from_name(caps.name("mon")?.as_str())?,
    };
    Some((year, month, day))
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_variants() {
        let parser = DateParser::new();
        assert_eq!(parser.parse("2024-01-10"), Some(ymd(2024, 1, 10)));
        assert_eq!(parser.parse("2024.1.5"), Some(ymd(2024, 1, 5)));
        assert_eq!(parser.parse("2024/12/31"), Some(ymd(2024, 12, 31)));
        assert_eq!(parser.parse("2024. 01. 10"), Some(ymd(2024, 1, 10)));
    }

    #[test]
    fn test_date_with_time_keeps_time_in_text() {
        let parser = DateParser::new();
        let found = parser.find_all("접수 2024-03-02 14:30:00 응급실");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "2024-03-02 14:30:00");
        assert_eq!(found[0].to_date(), Some(ymd(2024, 3, 2)));
    }

    #[test]
    fn test_compact_and_korean_forms() {
        let parser = DateParser::new();
        assert_eq!(parser.parse("20240110"), Some(ymd(2024, 1, 10)));
        assert_eq!(parser.parse("2024년 1월 10일"), Some(ymd(2024, 1, 10)));
        assert_eq!(parser.parse("2024년1월10일 14시 30분"), Some(ymd(2024, 1, 10)));
    }

    #[test]
    fn test_english_forms() {
        let parser = DateParser::new();
        assert_eq!(parser.parse("Jan 10, 2024"), Some(ymd(2024, 1, 10)));
        assert_eq!(parser.parse("September 27th 2024"), Some(ymd(2024, 9, 27)));
        assert_eq!(parser.parse("10 Jan 2024"), Some(ymd(2024, 1, 10)));
    }

    #[test]
    fn test_words_resembling_months_are_ignored() {
        let parser = DateParser::new();
        assert!(parser.find_all("marked 10 2024").is_empty());
    }

    #[test]
    fn test_digit_glued_matches_rejected() {
        let parser = DateParser::new();
        assert!(parser.find_all("12024-01-10").is_empty());
        assert!(parser.find_all("2024-01-101").is_empty());
        assert!(parser.find_all("120240110").is_empty());
    }

    #[test]
    fn test_impossible_date_is_matched_but_unparseable() {
        let parser = DateParser::new();
        let found = parser.find_all("2024-02-30");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_date(), None);
        assert_eq!(parser.parse("2024-13-45"), None);
    }

    #[test]
    fn test_matches_ordered_by_position() {
        let parser = DateParser::new();
        let found = parser.find_all("2024년 2월 1일 그리고 2024-01-10");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].format, DateFormat::KoreanLong);
        assert_eq!(found[1].format, DateFormat::Iso);
    }

    #[test]
    fn test_garbage_input_does_not_panic() {
        let parser = DateParser::new();
        assert!(parser.find_all("").is_empty());
        assert!(parser.find_all("년월일 ::// 9999").is_empty());
        assert_eq!(parser.parse("not a date"), None);
    }
}
