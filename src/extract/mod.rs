//! Field extraction from OCR text.
//!
//! Extraction is purely syntactic: it finds date, hospital, diagnosis and
//! code spans and groups them into records. Nothing here consults the
//! reference dictionaries.
//!
//! Record layout:
//! - a line containing a date opens a record; date-less lines continue it
//! - every date on the opening line is paired with every diagnosis entry
//!   (label/code pair) in the record
//! - a date-less preamble with diagnosis entries yields undated events
//! - a hospital on a line with no diagnosis after it carries into the next
//!   record that lacks one, but only a record with its own diagnosis or code
//!   takes it; a date with nothing but a carried hospital (`발급일`) is not a
//!   visit

pub mod dates;
pub mod patterns;

pub use dates::{DateFormat, DateMatch, DateParser};
pub use patterns::FieldPatterns;

use tracing::debug;

use crate::domain::RawEvent;

/// Compiled extraction patterns. Build once, reuse for every document.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    dates: DateParser,
    fields: FieldPatterns,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    offset: usize,
    text: &'a str,
}

/// Lines from one date-bearing line up to the next
#[derive(Debug)]
struct Record<'a> {
    dates: Vec<DateMatch>,
    lines: Vec<Line<'a>>,
}

impl<'a> Record<'a> {
    fn preamble() -> Self {
        Self {
            dates: Vec::new(),
            lines: Vec::new(),
        }
    }

    fn is_dated(&self) -> bool {
        !self.dates.is_empty()
    }
}

/// A diagnosis label and/or code found in a record
#[derive(Debug, Clone)]
struct Entry {
    diagnosis: String,
    code: Option<String>,
    offset: usize,
    line: usize,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The date battery, shared with normalization and the date audit
    pub fn date_parser(&self) -> &DateParser {
        &self.dates
    }

    /// Extract candidate events from `text` in source order
    pub fn extract(&self, text: &str) -> Vec<RawEvent> {
        let mut events = Vec::new();
        let mut pending_hospital = None;
        let mut current = Record::preamble();

        for line in lines(text) {
            let found = self.dates.find_all(line.text);
            if found.is_empty() {
                current.lines.push(line);
                continue;
            }

            let opened = Record {
                dates: found,
                lines: vec![line],
            };
            let finished = std::mem::replace(&mut current, opened);
            self.flush(finished, &mut pending_hospital, &mut events);
        }
        self.flush(current, &mut pending_hospital, &mut events);

        debug!(count = events.len(), "extracted raw events");
        events
    }

    fn flush(&self, record: Record<'_>, pending: &mut Option<String>, out: &mut Vec<RawEvent>) {
        if record.lines.is_empty() {
            return;
        }

        let date_spans: Vec<(usize, usize)> = record.dates.iter().map(|d| (d.start, d.end)).collect();
        let masked: Vec<String> = record
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 && record.is_dated() {
                    mask(line.text, &date_spans)
                } else {
                    line.text.to_string()
                }
            })
            .collect();

        let mut entries: Vec<Entry> = Vec::new();
        let mut hospitals: Vec<(usize, String)> = Vec::new();

        for (i, (line, text)) in record.lines.iter().zip(&masked).enumerate() {
            if let Some(span) = self.fields.hospital(text) {
                hospitals.push((i, span.text));
            }
            self.collect_entries(text, line.offset, i, &mut entries);
        }

        // Hospital precedence: the opening line, then one carried from the
        // previous record, then the first continuation line
        let carried = pending.take();
        let opening = hospitals
            .first()
            .filter(|(i, _)| *i == 0 && record.is_dated())
            .map(|(_, name)| name.clone());
        let mut used_line = opening.as_ref().map(|_| 0);
        let mut hospital = opening.or(carried);
        if hospital.is_none() {
            if let Some((i, name)) = hospitals.first() {
                used_line = Some(*i);
                hospital = Some(name.clone());
            }
        }

        let last_entry_line = entries.iter().map(|e| e.line).max();
        *pending = hospitals
            .iter()
            .rev()
            .find(|(i, _)| Some(*i) != used_line && last_entry_line.map_or(true, |last| *i > last))
            .map(|(_, name)| name.clone());

        if !record.is_dated() {
            if entries.is_empty() {
                if pending.is_none() {
                    *pending = hospital;
                }
                return;
            }
            for entry in entries {
                out.push(RawEvent {
                    date: String::new(),
                    hospital_raw: hospital.clone().unwrap_or_default(),
                    diagnosis_raw: entry.diagnosis,
                    code_raw: entry.code,
                    source_offset: entry.offset,
                });
            }
            return;
        }

        // A dated visit without any diagnosis still counts as a visit when
        // the hospital is on the record's own lines
        if entries.is_empty() {
            if used_line.is_none() {
                if pending.is_none() {
                    *pending = hospital;
                }
                return;
            }
            entries.push(Entry {
                diagnosis: String::new(),
                code: None,
                offset: 0,
                line: 0,
            });
        }

        let base = record.lines[0].offset;
        for date in &record.dates {
            for entry in &entries {
                out.push(RawEvent {
                    date: date.text.clone(),
                    hospital_raw: hospital.clone().unwrap_or_default(),
                    diagnosis_raw: entry.diagnosis.clone(),
                    code_raw: entry.code.clone(),
                    source_offset: base + date.start,
                });
            }
        }
    }

    /// Labelled diagnoses first, then free-standing codes. A code with no
    /// words before it fills the first labelled entry still lacking a code.
    fn collect_entries(&self, text: &str, offset: usize, line: usize, entries: &mut Vec<Entry>) {
        let labelled = self.fields.diagnoses(text);

        for diagnosis in &labelled {
            entries.push(Entry {
                diagnosis: diagnosis.name.clone(),
                code: diagnosis.code.as_ref().map(|c| c.text.clone()),
                offset: offset + diagnosis.start,
                line,
            });
        }

        let orphans = self
            .fields
            .codes(text)
            .into_iter()
            .filter(|c| !labelled.iter().any(|d| c.start >= d.start && c.start < d.end));

        for code in orphans {
            match self.fields.preceding_term(text, code.start) {
                Some(term) => entries.push(Entry {
                    diagnosis: term,
                    code: Some(code.text),
                    offset: offset + code.start,
                    line,
                }),
                None => {
                    let open = entries
                        .iter_mut()
                        .find(|e| e.code.is_none() && !e.diagnosis.is_empty());
                    match open {
                        Some(entry) => entry.code = Some(code.text),
                        None => entries.push(Entry {
                            diagnosis: String::new(),
                            code: Some(code.text),
                            offset: offset + code.start,
                            line,
                        }),
                    }
                }
            }
        }
    }
}

fn lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |chunk| {
        let line = Line {
            offset,
            text: chunk.trim_end_matches(['\n', '\r']),
        };
        offset += chunk.len();
        line
    })
}

/// Blank out `spans` with spaces, keeping byte offsets intact
fn mask(text: &str, spans: &[(usize, usize)]) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut cursor = 0;

    for &(start, end) in spans {
        if end <= cursor {
            continue;
        }
        let start = start.max(cursor);
        masked.push_str(&text[cursor..start]);
        masked.push_str(&" ".repeat(end - start));
        cursor = end;
    }
    masked.push_str(&text[cursor..]);

    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<RawEvent> {
        FieldExtractor::new().extract(text)
    }

    #[test]
    fn test_single_line_record() {
        let events = extract("2024-02-12 서울대학교병원 진단명: 위암 (C16.9)");
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.date, "2024-02-12");
        assert_eq!(event.hospital_raw, "서울대학교병원");
        assert_eq!(event.diagnosis_raw, "위암");
        assert_eq!(event.code_raw.as_deref(), Some("C16.9"));
        assert_eq!(event.source_offset, 0);
    }

    #[test]
    fn test_offsets_point_at_dates() {
        let text = "진료 내역\n2024-05-01 서울대학교병원 진단명: 요추 추간판 장애\n2024-05-05 삼성서울병원 진단명: 요추 추간판 장애\n";
        let events = extract(text);
        assert_eq!(events.len(), 2);
        for event in &events {
            assert!(text[event.source_offset..].starts_with(&event.date));
        }
        assert_eq!(events[1].hospital_raw, "삼성서울병원");
    }

    #[test]
    fn test_block_layout_carries_hospital_forward() {
        let text = "병원명: 서울대병원\n내원일: 2024-01-10\n진단명: 위암 (C16.9)\n병원명: 삼성서울병원\n내원일: 2024-02-01\n진단명: 협심증\n";
        let events = extract(text);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].hospital_raw, "서울대병원");
        assert_eq!(events[0].diagnosis_raw, "위암");
        assert_eq!(events[1].hospital_raw, "삼성서울병원");
        assert_eq!(events[1].diagnosis_raw, "협심증");
        assert_eq!(events[1].code_raw, None);
    }

    #[test]
    fn test_every_date_times_every_entry() {
        let text = "입원 2024-01-10 퇴원 2024-01-15 세브란스병원\n주진단명: 협심증 (I20.9)\n부진단명: 위염 K29.7\n";
        let events = extract(text);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].date, "2024-01-10");
        assert_eq!(events[1].date, "2024-01-10");
        assert_eq!(events[2].date, "2024-01-15");
        assert_eq!(events[3].diagnosis_raw, "위염");
        assert_eq!(events[3].code_raw.as_deref(), Some("K29.7"));
    }

    #[test]
    fn test_free_standing_code_with_term() {
        let events = extract("2024.03.02 튼튼정형외과의원 요추 추간판 장애 M51.2");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].diagnosis_raw, "요추 추간판 장애");
        assert_eq!(events[0].code_raw.as_deref(), Some("M51.2"));
    }

    #[test]
    fn test_code_label_attaches_to_diagnosis() {
        let events = extract("2024-03-02 연세내과의원\n진단명: 당뇨\n상병코드: E11.9\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].diagnosis_raw, "당뇨");
        assert_eq!(events[0].code_raw.as_deref(), Some("E11.9"));
    }

    #[test]
    fn test_preamble_diagnosis_is_undated() {
        let events = extract("과거력\n진단명: 고혈압 (I10)\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, "");
        assert!(!events[0].has_date());
        assert_eq!(events[0].code_raw.as_deref(), Some("I10"));
        assert_eq!(events[0].source_offset, "과거력\n".len());
    }

    #[test]
    fn test_dated_visit_without_diagnosis() {
        let events = extract("2024-05-01 서울아산병원 외래 방문");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].hospital_raw, "서울아산병원");
        assert_eq!(events[0].diagnosis_raw, "");
    }

    #[test]
    fn test_header_date_does_not_take_carried_hospital() {
        let events = extract("병원명: 서울대병원\n발급일: 2024-02-20\n");
        assert!(events.is_empty());

        let text = "병원명: 서울대병원\n발급일: 2024-02-20\n내원일: 2024-01-10\n진단명: 위암 (C16.9)\n";
        let events = extract(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, "2024-01-10");
        assert_eq!(events[0].hospital_raw, "서울대병원");
    }

    #[test]
    fn test_hospital_on_continuation_line_makes_a_visit() {
        let events = extract("2024-05-01\n서울아산병원 외래\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].hospital_raw, "서울아산병원");
    }

    #[test]
    fn test_bare_dates_are_skipped() {
        assert!(extract("발급일 2024-06-01\n출력일 2024-06-02").is_empty());
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(extract("").is_empty());
        assert!(extract("\n\n\r\n").is_empty());
        assert!(extract("@@@ ::: 2024-99-99 ### 진단명:").len() <= 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let events = extract("2024-01-10 서울대병원\r\n진단명: 위암\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].diagnosis_raw, "위암");
    }
}
