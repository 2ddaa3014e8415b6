//! Text utilities for span computation.
//!
//! All offsets are UTF-8 byte indices into the original string. Matching
//! folds case and treats the typographic apostrophe (’) as `'`, but never
//! maps offsets through a normalized copy of the text.

use crate::domain::TextSpan;

/// Fold a character for comparison: lowercase, curly apostrophe -> straight
pub fn fold_char(c: char) -> char {
    match c {
        '\u{2019}' | '\u{2018}' => '\'',
        _ => c.to_lowercase().next().unwrap_or(c),
    }
}

/// Normalize a phrase: fold characters, collapse whitespace, trim
/// surrounding punctuation
pub fn normalize(text: &str) -> String {
    let folded: String = text.chars().map(fold_char).collect();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '\'')
        .trim()
        .to_string()
}

/// Find every case-insensitive occurrence of `needle` in `haystack`.
///
/// A single space in the (normalized) needle matches any non-empty run of
/// whitespace in the haystack. Occurrences do not overlap.
pub fn find_ci(haystack: &str, needle: &str) -> Vec<TextSpan> {
    let needle: Vec<char> = normalize(needle).chars().collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut from = 0;

    while from < haystack.len() {
        match match_at(haystack, from, &needle) {
            Some(end) => {
                if let Some(span) = TextSpan::new(from, end) {
                    spans.push(span);
                }
                from = end;
            }
            None => {
                from += haystack[from..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    spans
}

/// Try to match `needle` starting at byte `start`; returns the end offset
fn match_at(haystack: &str, start: usize, needle: &[char]) -> Option<usize> {
    let mut chars = haystack[start..].char_indices().peekable();
    let mut end = start;

    for &expected in needle {
        if expected == ' ' {
            let mut consumed = false;
            while let Some(&(i, c)) = chars.peek() {
                if !c.is_whitespace() {
                    break;
                }
                consumed = true;
                end = start + i + c.len_utf8();
                chars.next();
            }
            if !consumed {
                return None;
            }
        } else {
            let (i, c) = chars.next()?;
            if fold_char(c) != expected {
                return None;
            }
            end = start + i + c.len_utf8();
        }
    }

    Some(end)
}

/// Lowercased word tokens (letters, digits and apostrophes)
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .map(|w| w.chars().map(fold_char).collect::<String>())
        .map(|w| w.trim_matches('\'').to_string())
        .collect()
}

pub fn word_count(text: &str) -> usize {
    words(text).len()
}

/// First word of a clause, folded
pub fn first_word(text: &str) -> Option<String> {
    words(text).into_iter().next()
}

/// Split text into sentences on terminal punctuation and line breaks
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(|c: char| matches!(c, '.' | '!' | '?' | '\n'))
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Whether the byte offset starts a sentence (only whitespace and a
/// sentence terminator, or nothing, precede it)
pub fn is_sentence_start(text: &str, offset: usize) -> bool {
    match text[..offset].trim_end().chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | '\n' | ':' | '"' | '\u{201c}'),
    }
}

/// Uppercase the first character
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first character
pub fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Give `replacement` the same first-letter case as `original`
pub fn match_leading_case(replacement: &str, original: &str) -> String {
    match original.chars().next() {
        Some(c) if c.is_uppercase() => capitalize_first(replacement),
        Some(c) if c.is_lowercase() => lowercase_first(replacement),
        _ => replacement.to_string(),
    }
}

/// Byte length of `text` once trailing whitespace is removed
pub fn trimmed_end(text: &str) -> usize {
    text.trim_end().len()
}
