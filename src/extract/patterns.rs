//! Hospital, diagnosis and code patterns applied per line.

use regex::Regex;

const DIAGNOSIS_LABELS: &str = r"주진단명|부진단명|진단명|상병명|병명|주진단|부진단|진단|\b(?i:diagnosis|dx)\b";
const HOSPITAL_LABELS: &str = r"병원명|의료기관명|의료기관|요양기관명|요양기관|기관명|진료기관|내원기관|\b(?i:hospital|clinic|facility)\b";
const DATE_LABELS: &str = r"내원일자|내원일|진료일자|진료일|입원일|퇴원일|방문일|수진일|일자|날짜|\b(?i:date)\b";
const CODE_LABELS: &str = r"상병코드|질병코드|진단코드|코드|\b(?:KCD|ICD|(?i:code))\b";

const CODE_TOKEN: &str = r"[A-Z][0-9OIlSBZ]{2}(?:\.[0-9OIlSBZ]{1,3})?";
const HOSPITAL_SUFFIXES: [&str; 9] = [
    "대학교병원",
    "대학병원",
    "병원",
    "의원",
    "의료원",
    "한의원",
    "치과",
    "클리닉",
    "센터",
];

/// A matched piece of a line, offsets relative to the line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// A labelled diagnosis, possibly carrying its code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledDiagnosis {
    pub name: String,
    pub code: Option<Span>,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct FieldPatterns {
    hospital_labelled: Regex,
    hospital_korean: Regex,
    hospital_english: Regex,
    hospital_cut: Regex,
    diagnosis_labelled: Regex,
    diagnosis_cut: Regex,
    code: Regex,
    label_word: Regex,
}

impl Default for FieldPatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldPatterns {
    pub fn new() -> Self {
        let suffixes = HOSPITAL_SUFFIXES.join("|");

        Self {
            hospital_labelled: compile(&format!(
                r"(?:{HOSPITAL_LABELS})\s*[:：]\s*(?P<name>[^\n,;|\t:：]+)"
            )),
            hospital_korean: compile(&format!(
                r"[가-힣A-Za-z][가-힣A-Za-z0-9]{{0,19}}\s?(?:{suffixes})"
            )),
            hospital_english: compile(
                r"(?:[A-Z][A-Za-z.'&-]*\s+){1,5}(?:Hospital|Clinic|Medical Cent(?:er|re)|Health Cent(?:er|re))",
            ),
            hospital_cut: compile(&format!(
                r"(?:{DIAGNOSIS_LABELS}|{DATE_LABELS}|{CODE_LABELS}|\d{{4}})"
            )),
            diagnosis_labelled: compile(&format!(
                r"(?:{DIAGNOSIS_LABELS})\s*[:：]\s*(?P<name>[^\n,;|\t(\[:：]+)(?:[(\[]\s*(?P<code>{CODE_TOKEN})\s*[)\]])?"
            )),
            diagnosis_cut: compile(&format!(
                r"(?:{HOSPITAL_LABELS}|{DATE_LABELS}|{CODE_LABELS}|\d{{4}}\s*[-./년])"
            )),
            code: compile(CODE_TOKEN),
            label_word: compile(&format!(
                r"^(?:{DIAGNOSIS_LABELS}|{HOSPITAL_LABELS}|{DATE_LABELS}|{CODE_LABELS})$"
            )),
        }
    }

    /// First hospital mention on the line; labelled forms win over
    /// suffix-only forms.
    pub fn hospital(&self, line: &str) -> Option<Span> {
        if let Some(caps) = self.hospital_labelled.captures(line) {
            if let Some(name) = caps.name("name") {
                let cut = self
                    .hospital_cut
                    .find(name.as_str())
                    .map(|m| m.start())
                    .unwrap_or(name.as_str().len());
                if let Some(span) = trimmed_span(line, name.start(), name.start() + cut) {
                    return Some(span);
                }
            }
        }

        let korean = self.hospital_korean.find(line);
        let english = self.hospital_english.find(line);
        let best = match (korean, english) {
            (Some(k), Some(e)) => Some(if e.start() < k.start() { e } else { k }),
            (k, e) => k.or(e),
        }?;

        trimmed_span(line, best.start(), best.end())
    }

    /// Labelled diagnoses on the line in order of appearance
    pub fn diagnoses(&self, line: &str) -> Vec<LabelledDiagnosis> {
        let mut found = Vec::new();

        for caps in self.diagnosis_labelled.captures_iter(line) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };

            let cut = self
                .diagnosis_cut
                .find(name.as_str())
                .map(|m| m.start())
                .unwrap_or(name.as_str().len());
            let mut name_end = name.start() + cut;

            let mut code = caps.name("code").map(|c| Span {
                text: c.as_str().to_string(),
                start: c.start(),
                end: c.end(),
            });

            // "진단명: 위암 C16.9" carries its code without brackets
            if code.is_none() {
                let bare = self
                    .codes(&line[..name_end])
                    .into_iter()
                    .find(|c| c.start >= name.start());
                if let Some(bare) = bare {
                    name_end = bare.start;
                    code = Some(bare);
                }
            }

            let name = trimmed_span(line, name.start(), name_end)
                .map(|s| s.text)
                .unwrap_or_default();
            if name.is_empty() && code.is_none() {
                continue;
            }

            found.push(LabelledDiagnosis {
                name,
                code,
                start: whole.start(),
                end: whole.end(),
            });
        }

        found
    }

    /// Code-shaped tokens standing on their own
    pub fn codes(&self, line: &str) -> Vec<Span> {
        self.code
            .find_iter(line)
            .filter(|m| alnum_bounded(line, m.start(), m.end()))
            .filter(|m| m.as_str().chars().skip(1).any(|c| c.is_ascii_digit()))
            .map(|m| Span {
                text: m.as_str().to_string(),
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }

    /// The words directly before a code (`요추 추간판 장애 M51.2`), stopping
    /// at labels, hospital names, digits and other codes.
    pub fn preceding_term(&self, line: &str, code_start: usize) -> Option<String> {
        let before = line[..code_start].trim_end_matches(|c: char| {
            c.is_whitespace() || matches!(c, '(' | '[' | ':' | '：' | '-' | '/')
        });

        let mut words = Vec::new();
        for token in before.split_whitespace().rev() {
            let word = token.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty()
                || words.len() == 4
                || !word.chars().any(char::is_alphabetic)
                || word.chars().any(|c| c.is_ascii_digit())
                || self.label_word.is_match(word)
                || HOSPITAL_SUFFIXES.iter().any(|s| word.ends_with(s))
                || token.contains([':', '：'])
            {
                break;
            }
            words.push(word);
        }

        if words.is_empty() {
            return None;
        }
        words.reverse();
        Some(words.join(" "))
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("field pattern must compile")
}

fn alnum_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map(|c| c.is_ascii_alphanumeric()).unwrap_or(false)
        && !after.map(|c| c.is_ascii_alphanumeric()).unwrap_or(false)
}

/// Span of `line[start..end]` with surrounding whitespace and separators
/// removed, `None` when nothing is left.
fn trimmed_span(line: &str, start: usize, end: usize) -> Option<Span> {
    let raw = &line[start..end];
    let is_noise = |c: char| c.is_whitespace() || matches!(c, '-' | '/' | ':' | '：' | '·' | '.');

    let leading = raw.len() - raw.trim_start_matches(is_noise).len();
    let text = raw.trim_matches(is_noise);
    if text.is_empty() {
        return None;
    }

    Some(Span {
        text: text.to_string(),
        start: start + leading,
        end: start + leading + text.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_hospital_wins() {
        let p = FieldPatterns::new();
        let span = p.hospital("외래 세브란스병원 협진 / 병원명: 서울대학교병원").unwrap();
        assert_eq!(span.text, "서울대학교병원");
    }

    #[test]
    fn test_labelled_hospital_stops_at_next_label() {
        let p = FieldPatterns::new();
        let span = p.hospital("요양기관: 연세내과의원 진단명 당뇨").unwrap();
        assert_eq!(span.text, "연세내과의원");
    }

    #[test]
    fn test_suffix_hospital() {
        let p = FieldPatterns::new();
        let line = "           서울대학교병원 진단명: 위암";
        let span = p.hospital(line).unwrap();
        assert_eq!(span.text, "서울대학교병원");
        assert_eq!(&line[span.start..span.end], "서울대학교병원");
    }

    #[test]
    fn test_suffix_hospital_is_last_token_only() {
        let p = FieldPatterns::new();
        let line = "외래 진료 서울대학교병원 진단명: 위암";
        let span = p.hospital(line).unwrap();
        assert_eq!(span.text, "서울대학교병원");
        assert_eq!(span.start, line.find("서울").unwrap());

        assert_eq!(p.hospital("국민건강보험 일산병원").unwrap().text, "일산병원");
    }

    #[test]
    fn test_english_hospital() {
        let p = FieldPatterns::new();
        let span = p.hospital("seen at Seoul National University Hospital today").unwrap();
        assert_eq!(span.text, "Seoul National University Hospital");
    }

    #[test]
    fn test_no_hospital() {
        let p = FieldPatterns::new();
        assert!(p.hospital("진단명: 위암").is_none());
    }

    #[test]
    fn test_labelled_diagnosis_with_bracketed_code() {
        let p = FieldPatterns::new();
        let found = p.diagnoses("진단명: 위암 (C16.9)");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "위암");
        assert_eq!(found[0].code.as_ref().unwrap().text, "C16.9");
    }

    #[test]
    fn test_labelled_diagnosis_with_bare_code() {
        let p = FieldPatterns::new();
        let found = p.diagnoses("상병명: 요추 추간판 장애 M51.2");
        assert_eq!(found[0].name, "요추 추간판 장애");
        assert_eq!(found[0].code.as_ref().unwrap().text, "M51.2");
    }

    #[test]
    fn test_multiple_diagnoses_on_one_line() {
        let p = FieldPatterns::new();
        let found = p.diagnoses("주진단명: 협심증 (I20.9), 부진단명: 위염");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "협심증");
        assert_eq!(found[1].name, "위염");
        assert!(found[1].code.is_none());
    }

    #[test]
    fn test_diagnosis_stops_at_hospital_label() {
        let p = FieldPatterns::new();
        let found = p.diagnoses("Diagnosis: gastric cancer Hospital: SNUH");
        assert_eq!(found[0].name, "gastric cancer");
    }

    #[test]
    fn test_code_tokens_and_boundaries() {
        let p = FieldPatterns::new();
        let codes: Vec<String> = p
            .codes("C16.9 / E1l.9 BOIL SOS XC16 I10.")
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(codes, vec!["C16.9", "E1l.9", "I10"]);
    }

    #[test]
    fn test_preceding_term() {
        let p = FieldPatterns::new();
        let line = "서울대학교병원 요추 추간판 장애 M51.2";
        let start = line.find("M51").unwrap();
        assert_eq!(p.preceding_term(line, start).as_deref(), Some("요추 추간판 장애"));

        let line = "상병코드: C16.9";
        let start = line.find("C16").unwrap();
        assert_eq!(p.preceding_term(line, start), None);
    }
}
