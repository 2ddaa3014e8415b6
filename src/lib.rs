//! copyguard - Compliance engine for multi-platform marketing copy
//!
//! Detects seven rhetorical patterns that mark machine-written prose (em
//! dashes and six "not X, but Y" contrast shapes), rewrites them
//! deterministically, and drives a bounded revision loop that records every
//! change as an immutable version.
//!
//! # Architecture
//!
//! - Detection is a pure three-stage pipeline: structural grammar, semantic
//!   filter, brand-aware stylistic weighting
//! - Rewrites are planned against the original text and applied right-to-left
//! - Every text change is committed to an append-only version store, which
//!   can be journaled to JSONL and replayed
//!
//! # Modules
//!
//! - `adapters`: External text generators (Fabric, OpenRouter)
//! - `config`: Layered YAML/env configuration
//! - `core`: Sanitizer, scorer, engine, version store, journal
//! - `detector`: Pattern detection
//! - `domain`: Data structures (Violation, Version, ComplianceState)
//!
//! # Usage
//!
//! ```no_run
//! use copyguard::{BrandParams, ComplianceEngine};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let engine = ComplianceEngine::default();
//! let outcome = engine
//!     .run_compliance("linkedin", "It's not just software; it's a revolution.", 5, &BrandParams::default())
//!     .await?;
//! println!("{:?}: {}", outcome.status, outcome.final_text);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod detector;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{GenerationError, GenerationRequest, Generator};
pub use config::BrandParams;
pub use core::{
    ComplianceEngine, ComplianceError, ComplianceOutcome, ComplianceSetOutcome, Sanitizer, VersionJournal,
    VersionStore,
};
pub use detector::{DetectionError, DetectionPolicy, Detector};
pub use domain::{
    ComplianceStatus, SinKind, TextSpan, Version, VersionAction, VersionId, Violation, ViolationReport,
};
