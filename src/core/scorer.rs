//! Authenticity scoring.
//!
//! A pure function of text, its violations and the brand parameters. The
//! overall score is a weighted sum of four dimensions, each in `[0, 1]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::BrandParams;
use crate::detector::text::{find_ci, sentences, word_count, words};
use crate::domain::Violation;

pub const PATTERN_CLEANLINESS: &str = "pattern_cleanliness";
pub const SENTENCE_VARIETY: &str = "sentence_variety";
pub const BRAND_ALIGNMENT: &str = "brand_alignment";
pub const HUMAN_QUALITY: &str = "human_quality";

const WEIGHTS: [(&str, f64); 4] = [
    (PATTERN_CLEANLINESS, 0.4),
    (SENTENCE_VARIETY, 0.2),
    (BRAND_ALIGNMENT, 0.2),
    (HUMAN_QUALITY, 0.2),
];

/// Violations per 100 words at which cleanliness bottoms out
const DENSITY_CEILING: f64 = 10.0;

const CONVERSATIONAL_MARKERS: &[&str] = &[
    "hey", "hi", "hello", "thanks", "thank you", "please", "sorry", "actually", "basically",
    "literally", "honestly", "frankly",
];

/// Whether another revision round is worthwhile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreVerdict {
    Continue,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityScore {
    pub overall: f64,
    pub dimensions: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
    pub threshold: f64,
}

impl AuthenticityScore {
    pub fn verdict(&self) -> ScoreVerdict {
        if self.overall < self.threshold {
            ScoreVerdict::Continue
        } else {
            ScoreVerdict::Done
        }
    }

    pub fn dimension(&self, name: &str) -> Option<f64> {
        self.dimensions.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticityScorer {
    threshold: f64,
}

impl Default for AuthenticityScorer {
    fn default() -> Self {
        Self::new(0.75)
    }
}

impl AuthenticityScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn score(&self, text: &str, violations: &[Violation], brand: &BrandParams) -> AuthenticityScore {
        let mut dimensions = BTreeMap::new();
        dimensions.insert(PATTERN_CLEANLINESS.to_string(), pattern_cleanliness(text, violations.len()));
        dimensions.insert(SENTENCE_VARIETY.to_string(), sentence_variety(text));
        dimensions.insert(BRAND_ALIGNMENT.to_string(), brand_alignment(text, &brand.vocabulary));
        dimensions.insert(HUMAN_QUALITY.to_string(), human_quality(text));

        let overall = WEIGHTS
            .iter()
            .map(|(name, weight)| dimensions.get(*name).copied().unwrap_or(0.0) * weight)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        AuthenticityScore {
            overall,
            recommendations: recommendations(text, violations.len(), &dimensions),
            dimensions,
            threshold: self.threshold,
        }
    }
}

fn pattern_cleanliness(text: &str, violations: usize) -> f64 {
    let words = word_count(text);
    if violations == 0 {
        return 1.0;
    }
    if words == 0 {
        return 0.0;
    }
    let density = violations as f64 * 100.0 / words as f64;
    1.0 - (density / DENSITY_CEILING).min(1.0)
}

/// Coefficient of variation of sentence word counts
fn sentence_variety(text: &str) -> f64 {
    let lengths: Vec<f64> = sentences(text)
        .iter()
        .map(|s| word_count(s) as f64)
        .collect();
    if lengths.len() < 2 {
        return 0.5;
    }

    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64;
    (variance.sqrt() / mean).clamp(0.0, 1.0)
}

fn brand_alignment(text: &str, vocabulary: &[String]) -> f64 {
    if vocabulary.is_empty() {
        return 0.75;
    }
    let present = vocabulary
        .iter()
        .filter(|term| !find_ci(text, term).is_empty())
        .count();
    present as f64 / vocabulary.len() as f64
}

fn contraction_count(text: &str) -> usize {
    words(text)
        .iter()
        .filter(|w| {
            w.split_once('\'')
                .map_or(false, |(head, tail)| !head.is_empty() && !tail.is_empty())
        })
        .count()
}

fn conversational_tone(text: &str) -> f64 {
    let markers = CONVERSATIONAL_MARKERS
        .iter()
        .filter(|m| !find_ci(text, m).is_empty())
        .count();
    (markers as f64 / 5.0).min(1.0)
}

/// Contractions, conversational markers and a few exclamations read as human
fn human_quality(text: &str) -> f64 {
    let mut score = 50.0;
    score += (contraction_count(text) as f64 * 3.0).min(25.0);
    score += conversational_tone(text) * 25.0;
    score += (text.matches('!').count() as f64 * 2.0).min(10.0);
    score.min(100.0) / 100.0
}

fn recommendations(text: &str, violations: usize, dimensions: &BTreeMap<String, f64>) -> Vec<String> {
    let mut out = Vec::new();
    let dim = |name: &str| dimensions.get(name).copied().unwrap_or(0.0);

    if violations > 0 {
        out.push(format!("Eliminate {} banned rhetorical patterns", violations));
    }
    if dim(SENTENCE_VARIETY) < 0.5 {
        out.push("Vary sentence lengths for better rhythm".to_string());
    }
    if dim(BRAND_ALIGNMENT) < 0.5 {
        out.push("Work more of the brand vocabulary into the copy".to_string());
    }
    if !text.contains('?') {
        out.push("Add questions to encourage reader interaction".to_string());
    }
    if contraction_count(text) < 3 {
        out.push("Use more contractions to sound more conversational".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SinKind, TextSpan};

    fn brand(vocabulary: &[&str]) -> BrandParams {
        BrandParams {
            vocabulary: vocabulary.iter().map(|s| s.to_string()).collect(),
            ..BrandParams::default()
        }
    }

    #[test]
    fn test_clean_text_dimensions() {
        let text = "Hey there. We've shipped the new planner and honestly, it's fast! Want a tour?";
        let score = AuthenticityScorer::default().score(text, &[], &brand(&[]));

        assert_eq!(score.dimension(PATTERN_CLEANLINESS), Some(1.0));
        assert_eq!(score.dimension(BRAND_ALIGNMENT), Some(0.75));
        assert!(score.dimension(HUMAN_QUALITY).unwrap() > 0.5);
        assert!(score.overall > 0.0 && score.overall <= 1.0);
    }

    #[test]
    fn test_violations_reduce_cleanliness() {
        let text = "It's not just software; it's a revolution.";
        let violation = Violation::new(SinKind::RhetoricalContrast, TextSpan::new(0, 41).unwrap(), 0.9);
        let score = AuthenticityScorer::default().score(text, &[violation], &brand(&[]));

        // 1 violation in 7 words is far past the ceiling
        assert_eq!(score.dimension(PATTERN_CLEANLINESS), Some(0.0));
        assert!(score.recommendations[0].starts_with("Eliminate 1"));
        assert_eq!(score.verdict(), ScoreVerdict::Continue);
    }

    #[test]
    fn test_brand_alignment_fraction() {
        let text = "Our planner keeps teams calm.";
        let score = AuthenticityScorer::default().score(text, &[], &brand(&["planner", "calm", "bold", "rigor"]));
        assert_eq!(score.dimension(BRAND_ALIGNMENT), Some(0.5));
    }

    #[test]
    fn test_single_sentence_variety_is_neutral() {
        assert_eq!(sentence_variety("Just one sentence here."), 0.5);
        assert_eq!(sentence_variety("Two words. Two words."), 0.0);
        assert!(sentence_variety("Short. This one is quite a lot longer than that.") > 0.5);
    }

    #[test]
    fn test_verdict_threshold() {
        let text = "Hey, thanks! We're glad you're here. Honestly, it's been a wild year and we've learned plenty. Questions?";
        let score = AuthenticityScorer::new(0.1).score(text, &[], &brand(&[]));
        assert_eq!(score.verdict(), ScoreVerdict::Done);

        let score = AuthenticityScorer::new(1.01).score(text, &[], &brand(&[]));
        assert_eq!(score.verdict(), ScoreVerdict::Continue);
    }
}
