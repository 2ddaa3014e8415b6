//! Compliance state for one workflow invocation.
//!
//! The state is created once per piece, mutated only through
//! [`ComplianceState::evaluate`], and discarded when the invocation ends.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::version::VersionId;
use super::violation::{SinKind, Violation};

/// Default revision budget
pub const DEFAULT_MAX_REVISIONS: u32 = 5;

/// Status of a compliance workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    /// Not yet evaluated
    Pending,

    /// No violations remain
    Pass,

    /// Violations remain and budget is left
    Revise,

    /// Budget exhausted with violations remaining
    ManualReview,
}

impl ComplianceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplianceStatus::Pass | ComplianceStatus::ManualReview)
    }
}

impl Default for ComplianceStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Revision counter and status for one piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceState {
    revision_count: u32,
    max_revisions: u32,
    status: ComplianceStatus,
}

impl ComplianceState {
    pub fn new(max_revisions: u32) -> Self {
        Self {
            revision_count: 0,
            max_revisions,
            status: ComplianceStatus::Pending,
        }
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }

    pub fn status(&self) -> ComplianceStatus {
        self.status
    }

    /// Apply the transition rule for one attempt.
    ///
    /// Terminal states are sticky: once `Pass` or `ManualReview` is reached,
    /// further calls return it unchanged and never touch the counter.
    pub fn evaluate(&mut self, violations: &[Violation]) -> ComplianceStatus {
        if self.status.is_terminal() {
            return self.status;
        }

        self.status = if violations.is_empty() {
            ComplianceStatus::Pass
        } else if self.revision_count < self.max_revisions {
            self.revision_count += 1;
            ComplianceStatus::Revise
        } else {
            ComplianceStatus::ManualReview
        };

        self.status
    }
}

impl Default for ComplianceState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REVISIONS)
    }
}

/// What happened during one detect → decide → repair attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Zero-based attempt index
    pub attempt: u32,

    pub status: ComplianceStatus,

    /// Violations found at the start of the attempt
    pub violations: Vec<Violation>,

    /// Version committed by this attempt, if any
    pub version_id: Option<VersionId>,

    /// Kinds the sanitizer could not remove
    #[serde(default)]
    pub residual: BTreeSet<SinKind>,

    /// Set when the external generator failed
    pub generation_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violation::TextSpan;

    fn one_violation() -> Vec<Violation> {
        vec![Violation::new(
            SinKind::EmDash,
            TextSpan::new(0, 3).unwrap(),
            0.8,
        )]
    }

    #[test]
    fn test_clean_text_passes() {
        let mut state = ComplianceState::new(5);
        assert_eq!(state.evaluate(&[]), ComplianceStatus::Pass);
        assert_eq!(state.revision_count(), 0);
    }

    #[test]
    fn test_revise_until_budget_exhausted() {
        let mut state = ComplianceState::new(2);
        let violations = one_violation();

        assert_eq!(state.evaluate(&violations), ComplianceStatus::Revise);
        assert_eq!(state.evaluate(&violations), ComplianceStatus::Revise);
        assert_eq!(state.revision_count(), 2);
        assert_eq!(state.evaluate(&violations), ComplianceStatus::ManualReview);
        assert_eq!(state.revision_count(), 2);
    }

    #[test]
    fn test_zero_budget_goes_straight_to_manual_review() {
        let mut state = ComplianceState::new(0);
        assert_eq!(state.evaluate(&one_violation()), ComplianceStatus::ManualReview);
        assert_eq!(state.revision_count(), 0);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut state = ComplianceState::new(3);
        assert_eq!(state.evaluate(&[]), ComplianceStatus::Pass);
        assert_eq!(state.evaluate(&one_violation()), ComplianceStatus::Pass);
        assert_eq!(state.revision_count(), 0);
    }
}
