//! Comparison keys for noisy names.
//!
//! A key is the lowercased name with stopwords removed and every
//! non-alphanumeric character dropped, so `의료법인 서울 대학교 병원` and
//! `서울대학교병원` compare equal.

/// Build the comparison key for `text`.
///
/// Stopwords containing non-ASCII characters or punctuation (`의료법인`,
/// `(주)`) are removed wherever they occur; plain ASCII stopwords (`the`,
/// `of`) only as whole tokens so `theater` survives.
pub fn normalize_key(text: &str, stopwords: &[String]) -> String {
    keyed_tokens(text, stopwords).0
}

/// The comparison key plus the byte offset in it where each source token
/// ends. Token ends let a caller tell `폐렴 구균` from `폐렴구균` after the
/// whitespace is gone.
pub fn keyed_tokens(text: &str, stopwords: &[String]) -> (String, Vec<usize>) {
    let mut lowered = text.to_lowercase();

    for stopword in stopwords {
        let stopword = stopword.to_lowercase();
        if !stopword.is_empty() && !is_ascii_word(&stopword) {
            lowered = lowered.replace(&stopword, " ");
        }
    }

    let mut key = String::with_capacity(lowered.len());
    let mut token_ends = Vec::new();
    let tokens = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .filter(|token| {
            !stopwords
                .iter()
                .any(|s| is_ascii_word(s) && s.eq_ignore_ascii_case(token))
        });
    for token in tokens {
        key.push_str(token);
        token_ends.push(key.len());
    }

    (key, token_ends)
}

fn is_ascii_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Character count, used for length comparisons on Hangul text
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}
