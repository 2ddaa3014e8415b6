//! Violation types shared by the detector, sanitizer and state machine.
//!
//! Every violation is keyed by a [`TextSpan`] into one specific string. Spans
//! are UTF-8 byte offsets, the same convention the rest of the crate uses for
//! slicing `str` values.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The seven banned rhetorical patterns.
///
/// Declaration order is the kind ordinal used for deterministic tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinKind {
    EmDash,
    RhetoricalContrast,
    Antithesis,
    Paradiastole,
    ReframingContrast,
    Chiasmus,
    TaglineFrame,
}

impl SinKind {
    /// Every kind, in ordinal order.
    pub const ALL: [SinKind; 7] = [
        SinKind::EmDash,
        SinKind::RhetoricalContrast,
        SinKind::Antithesis,
        SinKind::Paradiastole,
        SinKind::ReframingContrast,
        SinKind::Chiasmus,
        SinKind::TaglineFrame,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SinKind::EmDash => "em_dash",
            SinKind::RhetoricalContrast => "rhetorical_contrast",
            SinKind::Antithesis => "antithesis",
            SinKind::Paradiastole => "paradiastole",
            SinKind::ReframingContrast => "reframing_contrast",
            SinKind::Chiasmus => "chiasmus",
            SinKind::TaglineFrame => "tagline_frame",
        }
    }

    /// Human-readable explanation, used in revision prompts and reports
    pub fn description(&self) -> &'static str {
        match self {
            SinKind::EmDash => "Em dash usage creates robotic pauses",
            SinKind::RhetoricalContrast => "Rhetorical contrast creates artificial drama",
            SinKind::Antithesis => "Antithesis creates false dichotomies",
            SinKind::Paradiastole => "Paradiastole reclassifies concepts disingenuously",
            SinKind::ReframingContrast => "Reframing contrast disconnects from reality",
            SinKind::Chiasmus => "Chiasmus creates contrived parallelism",
            SinKind::TaglineFrame => "Tagline framing feels like corporate jargon",
        }
    }

    /// True for the six clause-pair kinds (everything except EmDash)
    pub fn is_contrast_family(&self) -> bool {
        !matches!(self, SinKind::EmDash)
    }
}

impl fmt::Display for SinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Violation severity. Every sin is critical by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Critical
    }
}

impl Severity {
    /// Weight used when aggregating a severity score
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.0,
        }
    }
}

/// Half-open byte range `[start, end)` into a specific string.
///
/// Serialized as a two-element array `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "[usize; 2]", try_from = "[usize; 2]")]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    /// Create a span. Returns `None` for empty or inverted ranges.
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether the span is a valid slice of `text`
    pub fn is_valid_for(&self, text: &str) -> bool {
        self.start < self.end
            && self.end <= text.len()
            && text.is_char_boundary(self.start)
            && text.is_char_boundary(self.end)
    }

    /// Slice `text` by this span, if valid
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.is_valid_for(text) {
            Some(&text[self.start..self.end])
        } else {
            None
        }
    }
}

impl From<TextSpan> for [usize; 2] {
    fn from(span: TextSpan) -> Self {
        [span.start, span.end]
    }
}

impl TryFrom<[usize; 2]> for TextSpan {
    type Error = String;

    fn try_from(value: [usize; 2]) -> Result<Self, Self::Error> {
        TextSpan::new(value[0], value[1])
            .ok_or_else(|| format!("invalid span [{}, {}]: start must be < end", value[0], value[1]))
    }
}

impl fmt::Display for TextSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A single detected violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: SinKind,
    pub span: TextSpan,
    pub severity: Severity,
    /// Estimated probability that the match is a true positive (0.0..=1.0)
    pub confidence: f64,
}

impl Violation {
    pub fn new(kind: SinKind, span: TextSpan, confidence: f64) -> Self {
        Self {
            kind,
            span,
            severity: Severity::Critical,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Violations per platform, each list ordered by ascending span start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationReport {
    platforms: BTreeMap<String, Vec<Violation>>,
}

impl ViolationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the violations for one platform, keeping start order
    pub fn insert(&mut self, platform: impl Into<String>, mut violations: Vec<Violation>) {
        violations.sort_by_key(|v| (v.span.start, v.span.end, v.kind));
        self.platforms.insert(platform.into(), violations);
    }

    pub fn get(&self, platform: &str) -> &[Violation] {
        self.platforms
            .get(platform)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn platforms(&self) -> impl Iterator<Item = (&str, &[Violation])> {
        self.platforms
            .iter()
            .map(|(platform, violations)| (platform.as_str(), violations.as_slice()))
    }

    /// True when no platform has any violation
    pub fn is_clean(&self) -> bool {
        self.platforms.values().all(Vec::is_empty)
    }

    pub fn total(&self) -> usize {
        self.platforms.values().map(Vec::len).sum()
    }

    /// Distinct kinds present across all platforms
    pub fn kinds(&self) -> BTreeSet<SinKind> {
        self.platforms
            .values()
            .flatten()
            .map(|v| v.kind)
            .collect()
    }

    /// Count of violations per kind across all platforms
    pub fn counts(&self) -> BTreeMap<SinKind, usize> {
        let mut counts = BTreeMap::new();
        for violation in self.platforms.values().flatten() {
            *counts.entry(violation.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Weighted average severity (0.0 when clean)
    pub fn severity_score(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .platforms
            .values()
            .flatten()
            .map(|v| v.severity.weight())
            .sum();
        weighted / total as f64
    }
}
