//! Diagnostic code repair and resolution.
//!
//! OCR regularly confuses letters and digits inside KCD/ICD-10 codes
//! (`C16.O`, `I2l.9`). Repair only touches the positions that must be
//! digits; the leading chapter letter is kept as read.

use crate::domain::ReferenceData;

/// A code after OCR repair, deprecation remapping and dictionary lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeResolution {
    /// Repaired (and possibly remapped) code
    pub code: String,
    /// Original deprecated code when a replacement was applied
    pub remapped_from: Option<String>,
    /// Canonical diagnosis the code resolves to
    pub canonical: Option<String>,
}

/// Repair a code token into `A00` / `A00.0` shape, or `None` if it cannot be.
pub fn repair_code(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    let mut chars = compact.chars();
    let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;

    let mut repaired = String::with_capacity(compact.len());
    repaired.push(letter);

    let mut digits_before_dot = 0;
    let mut digits_after_dot = 0;
    let mut seen_dot = false;

    for c in chars {
        if c == '.' {
            if seen_dot || digits_before_dot != 2 {
                return None;
            }
            seen_dot = true;
            repaired.push('.');
            continue;
        }

        let digit = repair_digit(c)?;
        if seen_dot {
            digits_after_dot += 1;
        } else {
            digits_before_dot += 1;
        }
        repaired.push(digit);
    }

    let valid = digits_before_dot == 2
        && (!seen_dot || (1..=3).contains(&digits_after_dot));

    valid.then_some(repaired)
}

fn repair_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        'O' | 'Q' | 'D' => Some('0'),
        'I' | 'L' | '|' => Some('1'),
        'S' => Some('5'),
        'B' => Some('8'),
        'Z' => Some('2'),
        _ => None,
    }
}

/// Repair, remap and look up a raw code token
pub fn resolve_code(raw: &str, reference: &ReferenceData) -> Option<CodeResolution> {
    let repaired = repair_code(raw)?;

    let (code, remapped_from) = match reference.replacement_code(&repaired) {
        Some(replacement) => (replacement.to_string(), Some(repaired)),
        None => (repaired, None),
    };

    let canonical = reference
        .diagnosis_by_code(&code)
        .map(|entry| entry.name.clone());

    Some(CodeResolution {
        code,
        remapped_from,
        canonical,
    })
}
