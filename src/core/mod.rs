//! Core compliance logic.
//!
//! This module contains:
//! - Sanitizer: deterministic rewrite rules with re-detection
//! - Scorer: authenticity scoring of finished copy
//! - Limits: revision, input size and generation bounds
//! - Engine: the revision state machine and multi-platform fan-out
//! - VersionStore / VersionJournal: append-only history and its persistence

pub mod engine;
pub mod journal;
pub mod limits;
pub mod sanitizer;
pub mod scorer;
pub mod version_store;

// Re-export commonly used types
pub use engine::{ComplianceEngine, ComplianceError, ComplianceOutcome, ComplianceSetOutcome};
pub use journal::VersionJournal;
pub use limits::{ComplianceLimits, LimitViolation};
pub use sanitizer::{SanitizeError, Sanitizer};
pub use scorer::{AuthenticityScore, AuthenticityScorer, ScoreVerdict};
pub use version_store::{
    HistoryOrder, PlatformChange, VersionAnalytics, VersionComparison, VersionStore, VersionStoreError,
};
