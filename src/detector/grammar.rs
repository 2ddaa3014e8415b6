//! One matcher per sin kind.
//!
//! Matchers implement the structural stage only: they report every place
//! their shape occurs, with a base confidence. The semantic and stylistic
//! stages live in the detector pipeline.

use super::shape::{ContrastShape, ShapeForm};
use super::text::{first_word, normalize, words};
use crate::domain::{SinKind, TextSpan};

pub const EM_DASH: char = '\u{2014}';

/// Words naming a vice or failing ("It's not laziness, it's efficiency")
const VICE_WORDS: &[&str] = &[
    "laziness", "lazy", "failure", "failing", "mistake", "weakness", "weak", "stubbornness",
    "stubborn", "selfishness", "selfish", "greed", "arrogance", "indecision", "procrastination",
    "cowardice", "rudeness", "rude", "recklessness", "reckless", "obsession", "quitting",
];

/// Words naming a cost or problem ("It's not a cost, it's an investment")
const COST_WORDS: &[&str] = &[
    "cost", "costs", "expense", "problem", "issue", "challenge", "setback", "risk", "obstacle",
    "burden", "loss", "threat", "price",
];

/// Nouns that turn an amplified denial into an ad tagline ("not just a car")
const PRODUCT_NOUNS: &[&str] = &[
    "car", "product", "service", "app", "tool", "platform", "company", "brand", "phone",
    "watch", "drink", "coffee", "shoe", "device", "game", "store", "website", "course",
    "book", "solution", "job", "place",
];

const CHIASMUS_OPENERS: &[&str] = &["does to you", "do to you", "makes you", "make you", "gives you", "give you"];
const CHIASMUS_CLOSERS: &[&str] = &["you do with", "you make of", "you get from", "you give to"];

/// A structural match before semantic filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: SinKind,
    pub span: TextSpan,
    pub confidence: f64,

    /// Parsed clause pair for contrast-family candidates
    pub shape: Option<ContrastShape>,
}

/// Structural matcher for one sin kind
pub trait PatternMatcher: Send + Sync {
    fn kind(&self) -> SinKind;

    /// Every structural occurrence in `text`, possibly overlapping
    fn match_all(&self, text: &str) -> Vec<Candidate>;
}

/// The matcher responsible for `kind`
pub fn matcher_for(kind: SinKind) -> Box<dyn PatternMatcher> {
    match kind {
        SinKind::EmDash => Box::new(EmDashMatcher),
        SinKind::RhetoricalContrast => Box::new(ContrastMatcher::new(SinKind::RhetoricalContrast)),
        SinKind::Antithesis => Box::new(ContrastMatcher::new(SinKind::Antithesis)),
        SinKind::Paradiastole => Box::new(ContrastMatcher::new(SinKind::Paradiastole)),
        SinKind::ReframingContrast => Box::new(ContrastMatcher::new(SinKind::ReframingContrast)),
        SinKind::Chiasmus => Box::new(ContrastMatcher::new(SinKind::Chiasmus)),
        SinKind::TaglineFrame => Box::new(ContrastMatcher::new(SinKind::TaglineFrame)),
    }
}

/// Matchers for every kind, in ordinal order
pub fn all_matchers() -> Vec<Box<dyn PatternMatcher>> {
    SinKind::ALL.into_iter().map(matcher_for).collect()
}

/// Literal U+2014. En dashes and hyphens never match.
pub struct EmDashMatcher;

impl PatternMatcher for EmDashMatcher {
    fn kind(&self) -> SinKind {
        SinKind::EmDash
    }

    fn match_all(&self, text: &str) -> Vec<Candidate> {
        text.match_indices(EM_DASH)
            .filter_map(|(start, dash)| TextSpan::new(start, start + dash.len()))
            .map(|span| Candidate {
                kind: SinKind::EmDash,
                span,
                confidence: 0.80,
                shape: None,
            })
            .collect()
    }
}

/// Clause-pair matcher, classifying shapes into one contrast-family kind
pub struct ContrastMatcher {
    kind: SinKind,
}

impl ContrastMatcher {
    pub fn new(kind: SinKind) -> Self {
        Self { kind }
    }

    /// Base confidence if `shape` is an instance of this matcher's kind
    fn classify(&self, shape: &ContrastShape, text: &str) -> Option<f64> {
        let negated_first = shape.form == ShapeForm::NegatedFirst;

        match self.kind {
            SinKind::EmDash => None,
            SinKind::Antithesis => Some(if negated_first { 0.85 } else { 0.82 }),
            SinKind::RhetoricalContrast => shape
                .is_amplified(text)
                .then_some(if negated_first { 0.90 } else { 0.84 }),
            SinKind::Paradiastole => {
                (negated_first && names_any(&shape.negated_core(text), VICE_WORDS)).then_some(0.91)
            }
            SinKind::ReframingContrast => {
                (negated_first && names_any(&shape.negated_core(text), COST_WORDS)).then_some(0.92)
            }
            SinKind::TaglineFrame => {
                (negated_first && shape.is_amplified(text) && is_product_frame(&shape.negated_core(text)))
                    .then_some(0.93)
            }
            SinKind::Chiasmus => (negated_first && is_chiasmus(shape, text)).then_some(0.95),
        }
    }
}

impl PatternMatcher for ContrastMatcher {
    fn kind(&self) -> SinKind {
        self.kind
    }

    fn match_all(&self, text: &str) -> Vec<Candidate> {
        ContrastShape::scan(text)
            .into_iter()
            .filter_map(|shape| {
                let confidence = self.classify(&shape, text)?;
                Some(Candidate {
                    kind: self.kind,
                    span: shape.span,
                    confidence,
                    shape: Some(shape),
                })
            })
            .collect()
    }
}

fn names_any(clause: &str, vocabulary: &[&str]) -> bool {
    words(clause).iter().any(|w| vocabulary.contains(&w.as_str()))
}

/// "a car", "an app", "a new kind of phone"
fn is_product_frame(core: &str) -> bool {
    let tokens = words(core);
    matches!(tokens.first().map(String::as_str), Some("a" | "an"))
        && tokens.iter().skip(1).any(|w| PRODUCT_NOUNS.contains(&w.as_str()))
}

fn is_chiasmus(shape: &ContrastShape, text: &str) -> bool {
    let negated = normalize(shape.negated_text(text));
    let affirmed = normalize(shape.affirmed_text(text));

    let both_what = first_word(&negated).as_deref() == Some("what")
        && first_word(&affirmed).as_deref() == Some("what");

    let mirrored = CHIASMUS_OPENERS.iter().any(|p| negated.contains(p))
        && CHIASMUS_CLOSERS.iter().any(|p| affirmed.contains(p));

    both_what || mirrored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_at(text: &str) -> Vec<(SinKind, f64)> {
        all_matchers()
            .iter()
            .flat_map(|m| m.match_all(text))
            .filter(|c| c.shape.as_ref().map_or(true, |s| s.is_plausible(text)))
            .map(|c| (c.kind, c.confidence))
            .collect()
    }

    fn best(text: &str) -> SinKind {
        let mut found = kinds_at(text);
        found.sort_by(|a, b| b.1.total_cmp(&a.1));
        found.first().map(|(k, _)| *k).unwrap()
    }

    #[test]
    fn test_matcher_for_covers_every_kind() {
        for kind in SinKind::ALL {
            assert_eq!(matcher_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_em_dash_offsets() {
        let text = "We grew \u{2014} fast \u{2014} and stayed lean.";
        let found = EmDashMatcher.match_all(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].span, TextSpan::new(8, 11).unwrap());
        assert_eq!(found[1].span, TextSpan::new(17, 20).unwrap());
    }

    #[test]
    fn test_en_dash_and_hyphen_ignored() {
        assert!(EmDashMatcher.match_all("pages 3\u{2013}5, well-known").is_empty());
    }

    #[test]
    fn test_classification() {
        assert_eq!(best("It's not just software; it's a revolution."), SinKind::RhetoricalContrast);
        assert_eq!(best("It's not laziness, it's efficiency."), SinKind::Paradiastole);
        assert_eq!(best("This isn't a cost; it's an investment."), SinKind::ReframingContrast);
        assert_eq!(best("It's not just a car, it's a lifestyle."), SinKind::TaglineFrame);
        assert_eq!(
            best("It's not what the product does to you, but what you do with it."),
            SinKind::Chiasmus
        );
        assert_eq!(best("They are not vendors, they are partners."), SinKind::Antithesis);
        assert_eq!(best("We sell outcomes, not hours."), SinKind::Antithesis);
        assert_eq!(best("We build tools, not just products."), SinKind::RhetoricalContrast);
    }

    #[test]
    fn test_every_contrast_also_matches_antithesis() {
        let text = "It's not just a car, it's a lifestyle.";
        let found = kinds_at(text);
        assert!(found.iter().any(|(k, _)| *k == SinKind::Antithesis));
        assert!(found.iter().any(|(k, _)| *k == SinKind::RhetoricalContrast));
        assert!(found.iter().any(|(k, _)| *k == SinKind::TaglineFrame));
    }
}
