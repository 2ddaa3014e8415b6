//! Clause-pair shapes underlying the six contrast-family kinds.
//!
//! Two structural forms are recognized:
//!
//! - **Negated-first**: `<subject> <negated copula> <clause A> <sep> <pivot> <clause B>`,
//!   e.g. "It's not just software; it's a revolution" or
//!   "It's not what X does to you, but what you do with X".
//! - **Trailing negation**: `<clause A>, not <clause B>`,
//!   e.g. "We sell outcomes, not hours".
//!
//! In both forms one clause is *negated* (denied) and the other is
//! *affirmed*. Scanning is purely structural; [`ContrastShape::is_plausible`]
//! is the semantic filter.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::text::{first_word, normalize, words};
use crate::domain::TextSpan;

const SUBJECTS: &str = r"it|this|that|he|she|they|we|you";

/// Words that amplify a denial ("not *just* X")
const AMPLIFIERS: &[&str] = &["just", "merely", "only", "simply"];

/// Continuations after ", not" that are ordinary English, not a contrast
const IDIOMATIC_CONTINUATIONS: &[&str] = &[
    "that", "to", "even", "yet", "necessarily", "least", "always", "quite", "much", "sure",
    "so", "too", "unlike", "counting", "including", "now", "really", "exactly", "all",
];

static NEGATED_FIRST: OnceLock<Option<Regex>> = OnceLock::new();
static TRAILING: OnceLock<Option<Regex>> = OnceLock::new();

fn negated_first_regex() -> Option<&'static Regex> {
    NEGATED_FIRST
        .get_or_init(|| {
            let pattern = format!(
                concat!(
                    r"(?i)\b(?P<subj>{s})",
                    r"(?P<neg>['’]s\s+not|['’]re\s+not|\s+(?:is|are|was|were)\s+not|\s+(?:isn|aren|wasn|weren)['’]t)",
                    r"\s+(?P<a>[^.!?;,:\x{{2014}}\n]+?)\s*(?P<sep>[;,:\x{{2014}}])\s*",
                    r"(?P<pivot>(?:but\s+(?:rather\s+)?)?(?:{s})(?:['’]s|['’]re|\s+is|\s+are|\s+was|\s+were)\s+|but\s+(?:rather\s+)?)",
                    r"(?P<b>[^.!?;\x{{2014}}\n]+)"
                ),
                s = SUBJECTS
            );
            Regex::new(&pattern).ok()
        })
        .as_ref()
}

fn trailing_regex() -> Option<&'static Regex> {
    TRAILING
        .get_or_init(|| {
            Regex::new(concat!(
                r"(?i)(?P<a>[^\s.!?;:,\x{2014}][^.!?;:,\x{2014}\n]*?)\s*(?P<sep>,|\x{2014})\s*",
                r"(?P<marker>not|rather\s+than|instead\s+of)\s+",
                r"(?P<b>[^.!?;:,\x{2014}\n]+)"
            ))
            .ok()
        })
        .as_ref()
}

/// Which structural form a shape was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeForm {
    NegatedFirst,
    TrailingNegation,
}

/// A parsed clause pair with byte spans into the scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContrastShape {
    pub form: ShapeForm,

    /// The whole construct, without trailing whitespace
    pub span: TextSpan,

    /// Subject of a negated-first shape ("It" in "It's not X")
    pub subject: Option<TextSpan>,

    /// Affirmative copula recovered from the negated one ("'s", " is", ...)
    pub copula: String,

    /// Clause being denied
    pub negated: TextSpan,

    /// Clause being asserted
    pub affirmed: TextSpan,

    /// Pivot before the affirmed clause, negated-first only ("it's ", "but ")
    pub pivot: Option<TextSpan>,

    /// Separator between the clauses
    pub separator: char,
}

impl ContrastShape {
    /// Structural scan: every clause-pair shape in `text`, both forms,
    /// possibly overlapping, ordered by form then start.
    pub fn scan(text: &str) -> Vec<ContrastShape> {
        let mut shapes = Vec::new();

        if let Some(re) = negated_first_regex() {
            let mut pos = 0;
            while pos < text.len() {
                let Some(caps) = re.captures_at(text, pos) else {
                    break;
                };
                let subj = caps.name("subj").map(|m| (m.start(), m.end()));
                if let Some(shape) = Self::from_negated_first(text, &caps) {
                    shapes.push(shape);
                }
                // Step past the subject so shapes nested in clause B are found too
                pos = match subj {
                    Some((_, end)) => end,
                    None => break,
                };
            }
        }

        if let Some(re) = trailing_regex() {
            let mut pos = 0;
            while pos < text.len() {
                let Some(caps) = re.captures_at(text, pos) else {
                    break;
                };
                let next = caps.name("sep").map(|m| m.end());
                if let Some(shape) = Self::from_trailing(text, &caps) {
                    shapes.push(shape);
                }
                pos = match next {
                    Some(end) => end,
                    None => break,
                };
            }
        }

        shapes
    }

    /// Plausible shapes keyed by span, first match wins.
    ///
    /// One scan serves every lookup, so rewriting many violations stays linear.
    pub fn index(text: &str) -> BTreeMap<TextSpan, ContrastShape> {
        let mut shapes = BTreeMap::new();
        for shape in Self::scan(text) {
            if shape.is_plausible(text) {
                shapes.entry(shape.span).or_insert(shape);
            }
        }
        shapes
    }

    fn from_negated_first(text: &str, caps: &Captures<'_>) -> Option<ContrastShape> {
        let subj = caps.name("subj")?;
        let neg = caps.name("neg")?;
        let a = caps.name("a")?;
        let sep = caps.name("sep")?;
        let pivot = caps.name("pivot")?;
        let b = caps.name("b")?;

        let b_end = b.start() + text[b.start()..b.end()].trim_end().len();
        let span = TextSpan::new(subj.start(), b_end)?;

        Some(ContrastShape {
            form: ShapeForm::NegatedFirst,
            span,
            subject: TextSpan::new(subj.start(), subj.end()),
            copula: affirmative_copula(neg.as_str()),
            negated: TextSpan::new(a.start(), a.end())?,
            affirmed: TextSpan::new(b.start(), b_end)?,
            pivot: TextSpan::new(pivot.start(), pivot.end()),
            separator: sep.as_str().chars().next()?,
        })
    }

    fn from_trailing(text: &str, caps: &Captures<'_>) -> Option<ContrastShape> {
        let a = caps.name("a")?;
        let sep = caps.name("sep")?;
        let marker = caps.name("marker")?;
        let b = caps.name("b")?;

        let a_end = a.start() + text[a.start()..a.end()].trim_end().len();
        let b_end = b.start() + text[b.start()..b.end()].trim_end().len();

        Some(ContrastShape {
            form: ShapeForm::TrailingNegation,
            span: TextSpan::new(a.start(), b_end)?,
            subject: None,
            copula: String::new(),
            // The marker belongs to the denied clause ("not hours")
            negated: TextSpan::new(marker.start(), b_end)?,
            affirmed: TextSpan::new(a.start(), a_end)?,
            pivot: None,
            separator: sep.as_str().chars().next()?,
        })
    }

    /// Text of the denied clause, without the marker for trailing shapes
    pub fn negated_text<'a>(&self, text: &'a str) -> &'a str {
        let clause = &text[self.negated.start..self.negated.end];
        match self.form {
            ShapeForm::NegatedFirst => clause,
            ShapeForm::TrailingNegation => strip_marker(clause),
        }
    }

    pub fn affirmed_text<'a>(&self, text: &'a str) -> &'a str {
        &text[self.affirmed.start..self.affirmed.end]
    }

    /// Whether the denied clause opens with "just", "merely", "only" or "simply"
    pub fn is_amplified(&self, text: &str) -> bool {
        first_word(self.negated_text(text))
            .map(|w| AMPLIFIERS.contains(&w.as_str()))
            .unwrap_or(false)
    }

    /// Denied clause with any amplifier removed, normalized
    pub fn negated_core(&self, text: &str) -> String {
        let clause = normalize(self.negated_text(text));
        match clause.split_once(' ') {
            Some((first, rest)) if AMPLIFIERS.contains(&first) => rest.to_string(),
            _ => clause,
        }
    }

    /// Semantic filter: rejects shape-only matches that are not contrasts.
    pub fn is_plausible(&self, text: &str) -> bool {
        let negated = normalize(self.negated_text(text));
        let affirmed = normalize(self.affirmed_text(text));

        if negated.is_empty() || affirmed.is_empty() || negated == affirmed {
            return false;
        }

        match self.form {
            ShapeForm::NegatedFirst => {
                // "It's not cheap; it's not fast" is an enumeration of denials
                let affirmed_words = words(&affirmed);
                !affirmed_words
                    .first()
                    .map(|w| is_negation(w))
                    .unwrap_or(true)
            }
            ShapeForm::TrailingNegation => {
                let affirmed_words = words(&affirmed);
                if affirmed_words.len() < 2 || affirmed_words.iter().any(|w| is_negation(w)) {
                    return false;
                }
                match first_word(&negated) {
                    Some(w) => !IDIOMATIC_CONTINUATIONS.contains(&w.as_str()),
                    None => false,
                }
            }
        }
    }
}

/// Whether a folded word is a negation
pub fn is_negation(word: &str) -> bool {
    matches!(word, "not" | "no" | "never" | "nor") || word.ends_with("n't")
}

/// Whether a clause contains a negation anywhere
pub fn contains_negation(clause: &str) -> bool {
    let folded = normalize(clause);
    words(clause).iter().any(|w| is_negation(w))
        || folded.contains("rather than")
        || folded.contains("instead of")
}

/// "'s not" -> "'s", " isn't" -> " is", ...
fn affirmative_copula(negated: &str) -> String {
    let lower = negated.to_lowercase();
    let trimmed = lower.trim();

    if trimmed.starts_with('\'') || trimmed.starts_with('\u{2019}') {
        // keep the writer's apostrophe style
        let apostrophe: String = trimmed.chars().take(1).collect();
        let rest: String = trimmed.chars().skip(1).take_while(|c| c.is_alphabetic()).collect();
        return format!("{}{}", apostrophe, rest);
    }

    let verb = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("is")
        .trim_end_matches("n't")
        .trim_end_matches("n’t");
    format!(" {}", verb)
}

/// Drop a leading "not" / "rather than" / "instead of" marker
fn strip_marker(clause: &str) -> &str {
    let lower = clause.to_lowercase();
    for marker in ["not", "rather than", "instead of"] {
        if lower.starts_with(marker) {
            return clause[marker.len()..].trim_start();
        }
    }
    clause
}
