//! Deterministic sanitizer.
//!
//! Rewrites each reported violation with exactly one rule, then re-runs the
//! detector on the result. Kinds that survive get their fallback rule on a
//! second pass; anything left after that is reported as
//! [`SanitizeError::SanitizationIncomplete`] together with the best-effort text.
//!
//! Edits are planned in ascending span order and applied right-to-left, so
//! every span still refers to untouched text when its edit is computed.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::detector::shape::{contains_negation, ContrastShape, ShapeForm};
use crate::detector::text::{find_ci, match_leading_case, words};
use crate::detector::{Detector, EM_DASH};
use crate::domain::{SinKind, TextSpan, TransformationRecord, Violation};

pub const RULE_SENTENCE_BREAK: &str = "em_dash.sentence_break";
pub const RULE_COMMA: &str = "em_dash.comma";
pub const RULE_DASH_REMOVED: &str = "em_dash.remove";
pub const RULE_AFFIRMED_CLAUSE: &str = "contrast.affirmed_clause";
pub const RULE_BARE_CLAUSE: &str = "contrast.bare_clause";

/// Internal attempts before giving up
const MAX_ATTEMPTS: u32 = 2;

const CONJUNCTIONS: &[&str] = &["and", "but", "or", "so", "yet", "nor", "for"];

const PRONOUNS: &[&str] = &["i", "we", "you", "he", "she", "it", "they", "this", "that", "there"];

const COMMON_VERBS: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "am", "has", "have", "had", "do", "does", "did",
    "can", "could", "will", "would", "should", "may", "might", "must", "get", "gets", "got",
    "make", "makes", "made", "go", "goes", "went", "take", "takes", "took", "need", "needs",
    "want", "wants", "see", "sees", "know", "knows", "work", "works", "grow", "grows", "help",
    "helps", "ship", "ships", "build", "builds", "sell", "sells", "run", "runs", "keep", "keeps",
];

/// Sanitizer errors
#[derive(Debug, Clone, Error)]
pub enum SanitizeError {
    #[error("Invalid span {span} for {kind} in text of {len} bytes")]
    InvalidSpan {
        kind: SinKind,
        span: TextSpan,
        len: usize,
    },

    #[error("Sanitization incomplete after {attempts} attempts, residual kinds: {residual:?}")]
    SanitizationIncomplete {
        residual: BTreeSet<SinKind>,
        attempts: u32,
        /// Best-effort rewrite
        text: String,
        log: Vec<TransformationRecord>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    Primary,
    Fallback,
}

/// One replacement. Removes `original[start..span.end]` plus `consumed`
/// chars from the front of the rewritten suffix.
#[derive(Debug)]
struct Edit {
    start: usize,
    consumed: usize,
    replacement: String,
    rule_id: &'static str,
}

/// Rule-based rewriter. Re-verifies its output with the borrowed detector.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer<'a> {
    detector: &'a Detector,
}

impl<'a> Sanitizer<'a> {
    pub fn new(detector: &'a Detector) -> Self {
        Self { detector }
    }

    /// Rewrite every violation in `text`.
    ///
    /// Returns the new text and the transformation log in ascending span
    /// order. Clean input (no violations) comes back unchanged with an empty
    /// log.
    #[instrument(level = "debug", skip_all, fields(violations = violations.len()))]
    pub fn sanitize(
        &self,
        text: &str,
        violations: &[Violation],
    ) -> Result<(String, Vec<TransformationRecord>), SanitizeError> {
        if violations.is_empty() {
            return Ok((text.to_string(), Vec::new()));
        }

        let plan = validate_plan(text, violations)?;
        let shapes = ContrastShape::index(text);
        let paired = paired_dashes(text, &plan);

        let mut fallback_kinds = BTreeSet::new();
        let mut best: Option<(String, Vec<TransformationRecord>, BTreeSet<SinKind>)> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let (rewritten, log) = apply_plan(text, &plan, &fallback_kinds, &shapes, &paired);
            let residual: BTreeSet<SinKind> = self
                .detector
                .detect(&rewritten)
                .iter()
                .map(|v| v.kind)
                .collect();

            if residual.is_empty() {
                debug!(attempt, records = log.len(), "Sanitization complete");
                return Ok((rewritten, log));
            }

            debug!(attempt, ?residual, "Residual violations after rewrite");
            fallback_kinds = residual.clone();
            best = Some((rewritten, log, residual));
        }

        let (text, log, residual) = best.unwrap_or_default();
        Err(SanitizeError::SanitizationIncomplete {
            residual,
            attempts: MAX_ATTEMPTS,
            text,
            log,
        })
    }
}

/// Sort violations by start and check bounds, boundaries and overlaps
fn validate_plan(text: &str, violations: &[Violation]) -> Result<Vec<Violation>, SanitizeError> {
    let mut plan = violations.to_vec();
    plan.sort_by_key(|v| (v.span.start, v.span.end, v.kind));

    let invalid = |v: &Violation| SanitizeError::InvalidSpan {
        kind: v.kind,
        span: v.span,
        len: text.len(),
    };

    let mut previous_end = 0;
    for violation in &plan {
        if !violation.span.is_valid_for(text) || violation.span.start < previous_end {
            return Err(invalid(violation));
        }
        if violation.kind == SinKind::EmDash && violation.span.slice(text) != Some("\u{2014}") {
            return Err(invalid(violation));
        }
        previous_end = violation.span.end;
    }

    Ok(plan)
}

/// Spans of em dashes that share a sentence with another em dash
fn paired_dashes(text: &str, plan: &[Violation]) -> BTreeSet<TextSpan> {
    let dashes: Vec<TextSpan> = plan
        .iter()
        .filter(|v| v.kind == SinKind::EmDash)
        .map(|v| v.span)
        .collect();

    let mut paired = BTreeSet::new();
    for pair in dashes.windows(2) {
        let between = &text[pair[0].end..pair[1].start];
        if !between.chars().any(|c| matches!(c, '.' | '!' | '?' | '\n')) {
            paired.insert(pair[0]);
            paired.insert(pair[1]);
        }
    }
    paired
}

/// Apply the plan right-to-left. `fallback_kinds` select the secondary rule.
///
/// The rewritten suffix is kept in reverse char order, so each edit only
/// pushes or pops at its front and the whole pass stays linear.
fn apply_plan(
    original: &str,
    plan: &[Violation],
    fallback_kinds: &BTreeSet<SinKind>,
    shapes: &BTreeMap<TextSpan, ContrastShape>,
    paired: &BTreeSet<TextSpan>,
) -> (String, Vec<TransformationRecord>) {
    let mut tail = String::with_capacity(original.len());
    let mut boundary = original.len();
    let mut log = Vec::with_capacity(plan.len());

    for violation in plan.iter().rev() {
        let span = violation.span;
        tail.extend(original[span.end..boundary].chars().rev());
        boundary = span.end;

        let priority = if fallback_kinds.contains(&violation.kind) {
            Priority::Fallback
        } else {
            Priority::Primary
        };

        let edit = match violation.kind {
            SinKind::EmDash => Some(plan_em_dash(
                &original[..span.start],
                &tail,
                priority,
                paired.contains(&span),
            )),
            _ => shapes
                .get(&span)
                .and_then(|shape| plan_contrast(original, shape, priority)),
        };

        let Some(edit) = edit else {
            debug!(kind = %violation.kind, span = %span, "No rule applies");
            continue;
        };

        debug!(kind = %violation.kind, rule = edit.rule_id, "Applying rewrite");
        for _ in 0..edit.consumed {
            tail.pop();
        }
        tail.extend(edit.replacement.chars().rev());
        boundary = edit.start;

        log.push(TransformationRecord {
            violation_kind: violation.kind,
            original_span: span,
            replacement_text: edit.replacement,
            rule_id: edit.rule_id.to_string(),
        });
    }

    tail.extend(original[..boundary].chars().rev());
    log.reverse();
    (tail.chars().rev().collect(), log)
}

fn is_inline_space(c: char) -> bool {
    c.is_whitespace() && c != '\n'
}

/// Em dash rewrite.
///
/// `before` is the untouched text left of the dash and `tail` the already
/// rewritten text after it, reversed. The edit may absorb spaces on either
/// side of the dash but never crosses a line break or touches non-space text
/// left of the dash. Paired dashes within one sentence read as a
/// parenthetical and take commas.
fn plan_em_dash(before: &str, tail: &str, priority: Priority, paired: bool) -> Edit {
    let left = before.trim_end_matches(is_inline_space).len();
    let prior = before[..left].chars().last();

    let mut ahead = tail.chars().rev().peekable();
    let mut spaces = 0;
    while ahead.next_if(|c| is_inline_space(*c)).is_some() {
        spaces += 1;
    }
    let next = ahead.peek().copied();

    let removed = |start| Edit {
        start,
        consumed: spaces,
        replacement: String::new(),
        rule_id: RULE_DASH_REMOVED,
    };

    // Dash before terminal punctuation or at the end
    let Some(next) = next.filter(|c| !matches!(*c, '.' | '!' | '?' | ';' | ':' | ',' | ')' | '"' | '\u{201d}' | '\n'))
    else {
        return removed(left);
    };

    // Dash opening a clause
    if prior.map_or(true, |c| {
        matches!(c, '.' | '!' | '?' | ';' | ':' | ',' | '(' | '"' | '\u{201c}' | '\n')
    }) {
        return removed(before.len());
    }

    let clause: String = ahead
        .take_while(|c| !(matches!(*c, '.' | '!' | '?' | ';' | ',' | '\n') || *c == EM_DASH))
        .collect();
    let prefers_break = is_sentential(&clause) && !paired;

    let sentence_break = match priority {
        Priority::Primary => prefers_break,
        Priority::Fallback => !prefers_break,
    };

    if sentence_break {
        Edit {
            start: left,
            consumed: spaces + 1,
            replacement: format!(". {}", next.to_uppercase()),
            rule_id: RULE_SENTENCE_BREAK,
        }
    } else {
        Edit {
            start: left,
            consumed: spaces,
            replacement: ", ".to_string(),
            rule_id: RULE_COMMA,
        }
    }
}

/// Whether a clause can stand as its own sentence (best-effort heuristic)
fn is_sentential(clause: &str) -> bool {
    let tokens = words(clause);
    let Some(first) = tokens.first() else {
        return false;
    };
    if CONJUNCTIONS.contains(&first.as_str()) {
        return false;
    }

    PRONOUNS.contains(&first.as_str())
        || tokens.iter().any(|w| {
            COMMON_VERBS.contains(&w.as_str())
                || is_contraction(w)
                || (w.len() > 4 && (w.ends_with("ed") || w.ends_with("ing")))
        })
}

fn is_contraction(word: &str) -> bool {
    ["'s", "'re", "'ve", "'ll", "'d", "'m", "n't"]
        .iter()
        .any(|suffix| word.len() > suffix.len() && word.ends_with(suffix))
}

/// Collapse a clause pair into its affirmed clause.
///
/// The shape comes from the original text; the span itself is never touched
/// by edits to its right.
fn plan_contrast(original: &str, shape: &ContrastShape, priority: Priority) -> Option<Edit> {
    let span = shape.span;
    let affirmed = shape.affirmed_text(original);

    let (kept, rule_id) = match (priority, shape.form) {
        (Priority::Primary, ShapeForm::NegatedFirst) => {
            (with_scaffold(original, shape, affirmed), RULE_AFFIRMED_CLAUSE)
        }
        (Priority::Primary, ShapeForm::TrailingNegation) => {
            (affirmed.to_string(), RULE_AFFIRMED_CLAUSE)
        }
        (Priority::Fallback, _) => (affirmed.to_string(), RULE_BARE_CLAUSE),
    };

    let kept = cut_negated_tail(&kept);
    if kept.is_empty() {
        return None;
    }

    Some(Edit {
        start: span.start,
        consumed: 0,
        replacement: match_leading_case(kept, &original[span.start..span.end]),
        rule_id,
    })
}

/// "It's not X; it's Y" -> "it's Y", "It's not X, but Y" -> "It's Y"
fn with_scaffold(original: &str, shape: &ContrastShape, affirmed: &str) -> String {
    let pivot = shape
        .pivot
        .and_then(|p| p.slice(original))
        .map(strip_but)
        .unwrap_or("")
        .trim_end();

    if !pivot.is_empty() {
        return format!("{} {}", pivot, affirmed);
    }

    match shape.subject.and_then(|s| s.slice(original)) {
        Some(subject) => format!("{}{} {}", subject, shape.copula, affirmed),
        None => affirmed.to_string(),
    }
}

/// Drop a leading "but" / "but rather"
fn strip_but(pivot: &str) -> &str {
    let mut rest = pivot.trim_start();
    for word in ["but", "rather"] {
        let matches_word = rest
            .get(..word.len())
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case(word));
        let followed_by_space = rest
            .get(word.len()..)
            .map_or(false, |tail| tail.starts_with(char::is_whitespace));
        if matches_word && followed_by_space {
            rest = rest[word.len()..].trim_start();
        }
    }
    rest
}

/// Cut the kept clause before any negated tail ("..., not Z", "rather than Z")
fn cut_negated_tail(clause: &str) -> &str {
    let mut cut = clause.len();

    for marker in ["rather than", "instead of"] {
        if let Some(span) = find_ci(clause, marker).first() {
            cut = cut.min(span.start);
        }
    }

    let mut offset = 0;
    for segment in clause.split(',') {
        if offset > 0 && contains_negation(segment) {
            cut = cut.min(offset - 1);
            break;
        }
        offset += segment.len() + 1;
    }

    clause[..cut].trim_end().trim_end_matches(',').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> (String, Vec<TransformationRecord>) {
        let detector = Detector::default();
        let violations = detector.detect(text);
        Sanitizer::new(&detector).sanitize(text, &violations).unwrap()
    }

    #[test]
    fn test_clean_text_unchanged() {
        let detector = Detector::default();
        let text = "Plain, honest copy.";
        let (out, log) = Sanitizer::new(&detector).sanitize(text, &[]).unwrap();
        assert_eq!(out, text);
        assert!(log.is_empty());
    }

    #[test]
    fn test_semicolon_contrast() {
        let (out, log) = run("It's not just software; it's a revolution.");
        assert_eq!(out, "It's a revolution.");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].rule_id, RULE_AFFIRMED_CLAUSE);
        assert_eq!(log[0].replacement_text, "It's a revolution");
    }

    #[test]
    fn test_two_em_dashes() {
        let (out, log) = run("We grew \u{2014} fast \u{2014} and stayed lean.");
        assert_eq!(out, "We grew, fast, and stayed lean.");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].original_span, TextSpan::new(8, 11).unwrap());
        assert_eq!(log[1].original_span, TextSpan::new(17, 20).unwrap());
        assert!(log.iter().all(|r| r.rule_id == RULE_COMMA));
    }

    #[test]
    fn test_em_dash_sentence_break() {
        let (out, log) = run("We shipped it\u{2014}it works.");
        assert_eq!(out, "We shipped it. It works.");
        assert_eq!(log[0].rule_id, RULE_SENTENCE_BREAK);
    }

    #[test]
    fn test_paired_em_dashes_take_commas() {
        let (out, log) = run("Our team\u{2014}engineers, designers, writers\u{2014}ships daily.");
        assert_eq!(out, "Our team, engineers, designers, writers, ships daily.");
        assert!(log.iter().all(|r| r.rule_id == RULE_COMMA));

        // Dashes in separate sentences are judged on their own
        let (out, _) = run("We shipped it\u{2014}it works. Our team\u{2014}engineers\u{2014}ships daily.");
        assert_eq!(out, "We shipped it. It works. Our team, engineers, ships daily.");
    }

    #[test]
    fn test_em_dash_at_clause_edge() {
        let (out, _) = run("Ready when you are \u{2014}.");
        assert_eq!(out, "Ready when you are.");
    }

    #[test]
    fn test_but_pivot_keeps_subject() {
        let (out, _) = run("It's not what the country can do for you, but what you can do for your country.");
        assert_eq!(out, "It's what you can do for your country.");
    }

    #[test]
    fn test_trailing_negation_keeps_affirmed_clause() {
        let (out, _) = run("Sure, we sell outcomes, not hours.");
        assert_eq!(out, "Sure, we sell outcomes.");
    }

    #[test]
    fn test_case_follows_original() {
        let (out, _) = run("Honestly, it's not a bug; it's a feature.");
        assert_eq!(out, "Honestly, it's a feature.");
    }

    #[test]
    fn test_invalid_spans_rejected() {
        let detector = Detector::default();
        let sanitizer = Sanitizer::new(&detector);
        let text = "short";

        let out_of_bounds = [Violation::new(SinKind::Antithesis, TextSpan::new(0, 100).unwrap(), 0.9)];
        assert!(matches!(
            sanitizer.sanitize(text, &out_of_bounds),
            Err(SanitizeError::InvalidSpan { .. })
        ));

        let overlapping = [
            Violation::new(SinKind::Antithesis, TextSpan::new(0, 3).unwrap(), 0.9),
            Violation::new(SinKind::Chiasmus, TextSpan::new(2, 5).unwrap(), 0.9),
        ];
        assert!(matches!(
            sanitizer.sanitize(text, &overlapping),
            Err(SanitizeError::InvalidSpan { .. })
        ));

        let not_a_dash = [Violation::new(SinKind::EmDash, TextSpan::new(0, 1).unwrap(), 0.8)];
        assert!(matches!(
            sanitizer.sanitize(text, &not_a_dash),
            Err(SanitizeError::InvalidSpan { .. })
        ));
    }

    #[test]
    fn test_unparseable_span_reports_incomplete() {
        let detector = Detector::default();
        let text = "It's not just software; it's a revolution.";
        let bogus = [Violation::new(SinKind::Antithesis, TextSpan::new(0, 10).unwrap(), 0.9)];

        match Sanitizer::new(&detector).sanitize(text, &bogus) {
            Err(SanitizeError::SanitizationIncomplete {
                residual,
                attempts,
                text: best,
                log,
            }) => {
                assert_eq!(attempts, 2);
                assert!(residual.contains(&SinKind::RhetoricalContrast));
                assert_eq!(best, text);
                assert!(log.is_empty());
            }
            other => panic!("expected SanitizationIncomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_cut_negated_tail() {
        assert_eq!(cut_negated_tail("a revolution, not a product"), "a revolution");
        assert_eq!(cut_negated_tail("tools rather than toys"), "tools");
        assert_eq!(cut_negated_tail("fast, cheap, and good"), "fast, cheap, and good");
    }

    #[test]
    fn test_sentential_heuristic() {
        assert!(is_sentential("it works"));
        assert!(is_sentential("shipping daily"));
        assert!(!is_sentential("and stayed lean"));
        assert!(!is_sentential("fast"));
    }
}
