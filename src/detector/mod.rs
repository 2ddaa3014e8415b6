//! Pattern detector.
//!
//! Finds the seven banned rhetorical patterns with exact byte spans. Detection
//! runs three ordered stages:
//!
//! 1. **Structural**: every [`PatternMatcher`] reports its raw shape matches
//! 2. **Semantic**: clause pairs that are not real contrasts are rejected
//! 3. **Stylistic**: allow-listed idioms and brand vocabulary lower confidence;
//!    candidates under the acceptance threshold are dropped
//!
//! Overlapping survivors are then resolved greedily so that the emitted
//! violations never overlap.

pub mod grammar;
pub mod shape;
pub mod text;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::{Violation, ViolationReport};
use self::text::find_ci;

pub use grammar::{all_matchers, matcher_for, Candidate, PatternMatcher, EM_DASH};
pub use shape::{ContrastShape, ShapeForm};

/// Multiplier applied when an allow-listed idiom overlaps a candidate
const ALLOW_LIST_FACTOR: f64 = 0.4;

/// Confidence removed per brand-vocabulary term inside a candidate
const BRAND_TERM_PENALTY: f64 = 0.05;
const MAX_BRAND_PENALTY: f64 = 0.15;

/// Errors from detection. Only malformed input can fail.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("input is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },
}

/// Brand-supplied knobs for the stylistic stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPolicy {
    /// Idioms the brand uses on purpose
    #[serde(default)]
    pub allow_list: Vec<String>,

    /// Brand vocabulary terms
    #[serde(default)]
    pub brand_vocabulary: Vec<String>,

    /// Candidates scoring below this are dropped (default: 0.5)
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,
}

fn default_acceptance_threshold() -> f64 {
    0.5
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            brand_vocabulary: Vec::new(),
            acceptance_threshold: default_acceptance_threshold(),
        }
    }
}

/// Stateless, deterministic detector over a fixed policy
pub struct Detector {
    policy: DetectionPolicy,
    matchers: Vec<Box<dyn PatternMatcher>>,
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("policy", &self.policy)
            .field("matchers", &self.matchers.len())
            .finish()
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DetectionPolicy::default())
    }
}

impl Detector {
    pub fn new(policy: DetectionPolicy) -> Self {
        Self {
            policy,
            matchers: all_matchers(),
        }
    }

    pub fn policy(&self) -> &DetectionPolicy {
        &self.policy
    }

    /// Detect violations in `text`, ordered by span start.
    ///
    /// Total: unmatched or empty text yields an empty list.
    #[instrument(level = "debug", skip(self, text), fields(bytes = text.len()))]
    pub fn detect(&self, text: &str) -> Vec<Violation> {
        if text.is_empty() {
            return Vec::new();
        }

        let structural = self.structural(text);
        let semantic = Self::semantic(text, structural);
        let stylistic = self.stylistic(text, semantic);
        let violations = Self::resolve(stylistic);

        debug!(count = violations.len(), "Detection complete");
        violations
    }

    /// Detect over raw bytes, rejecting input that is not UTF-8
    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<Vec<Violation>, DetectionError> {
        let text = std::str::from_utf8(bytes).map_err(|e| DetectionError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        })?;
        Ok(self.detect(text))
    }

    /// Detect every platform's text
    pub fn detect_report(&self, content: &BTreeMap<String, String>) -> ViolationReport {
        let mut report = ViolationReport::new();
        for (platform, text) in content {
            report.insert(platform.clone(), self.detect(text));
        }
        report
    }

    fn structural(&self, text: &str) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = self
            .matchers
            .iter()
            .flat_map(|matcher| matcher.match_all(text))
            .collect();
        debug!(count = candidates.len(), "Structural candidates");
        candidates
    }

    fn semantic(text: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .filter(|c| c.shape.as_ref().map_or(true, |shape| shape.is_plausible(text)))
            .collect()
    }

    fn stylistic(&self, text: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let idiom_spans: Vec<_> = self
            .policy
            .allow_list
            .iter()
            .flat_map(|idiom| find_ci(text, idiom))
            .collect();

        candidates
            .into_iter()
            .filter_map(|mut candidate| {
                if idiom_spans.iter().any(|idiom| idiom.overlaps(&candidate.span)) {
                    candidate.confidence *= ALLOW_LIST_FACTOR;
                }

                let slice = &text[candidate.span.start..candidate.span.end];
                let brand_terms = self
                    .policy
                    .brand_vocabulary
                    .iter()
                    .filter(|term| !find_ci(slice, term).is_empty())
                    .count();
                let penalty = (brand_terms as f64 * BRAND_TERM_PENALTY).min(MAX_BRAND_PENALTY);
                candidate.confidence = (candidate.confidence - penalty).clamp(0.0, 1.0);

                (candidate.confidence >= self.policy.acceptance_threshold).then_some(candidate)
            })
            .collect()
    }

    /// Greedy overlap resolution.
    ///
    /// Preference: higher confidence, then longer span, then lower kind
    /// ordinal, then earlier start. Never depends on iteration order.
    fn resolve(mut candidates: Vec<Candidate>) -> Vec<Violation> {
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.span.len().cmp(&a.span.len()))
                .then_with(|| a.kind.ordinal().cmp(&b.kind.ordinal()))
                .then_with(|| a.span.start.cmp(&b.span.start))
        });

        // Accepted spans are disjoint, keyed by start
        let mut accepted: BTreeMap<usize, Violation> = BTreeMap::new();
        for candidate in candidates {
            let span = candidate.span;
            let blocked = accepted
                .range(..span.end)
                .next_back()
                .map_or(false, |(_, v)| v.span.overlaps(&span));
            if blocked {
                continue;
            }
            accepted.insert(span.start, Violation::new(candidate.kind, span, candidate.confidence));
        }

        accepted.into_values().collect()
    }
}
