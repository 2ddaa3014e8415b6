//! Domain types for the compliance engine.
//!
//! This module contains the core data structures:
//! - Violations: kinds, spans and per-platform reports
//! - Versions: immutable content snapshots and their audit trail
//! - Compliance: the per-piece revision state

pub mod compliance;
pub mod version;
pub mod violation;

// Re-export commonly used types
pub use compliance::{AttemptRecord, ComplianceState, ComplianceStatus, DEFAULT_MAX_REVISIONS};
pub use version::{
    content_digest, PlatformContent, TransformationRecord, Version, VersionAction, VersionId,
};
pub use violation::{Severity, SinKind, TextSpan, Violation, ViolationReport};
