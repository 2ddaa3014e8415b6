//! Resource limits for compliance runs.
//!
//! Bounds the work one invocation can do:
//! - Revision attempts per piece
//! - Input size per piece
//! - Time spent waiting on the external generator

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DEFAULT_MAX_REVISIONS;

/// Limits applied by the compliance engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceLimits {
    /// Revision budget per piece (default: 5)
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Maximum input size in bytes per piece (default: 1MB)
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Timeout for one generator call in seconds (default: 120)
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_seconds: u64,
}

fn default_max_revisions() -> u32 {
    DEFAULT_MAX_REVISIONS
}
fn default_max_input_bytes() -> u64 {
    1024 * 1024
} // 1MB
fn default_generation_timeout() -> u64 {
    120
} // 2 min

impl Default for ComplianceLimits {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            max_input_bytes: default_max_input_bytes(),
            generation_timeout_seconds: default_generation_timeout(),
        }
    }
}

impl ComplianceLimits {
    /// Validate one piece of input against the size limit
    pub fn validate_input(&self, platform: &str, input: &str) -> Result<(), LimitViolation> {
        let size = input.len() as u64;
        if size > self.max_input_bytes {
            return Err(LimitViolation::MaxInputBytes {
                platform: platform.to_string(),
                actual: size,
                limit: self.max_input_bytes,
            });
        }
        Ok(())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }
}

/// Limit violations, surfaced to the caller before any work starts
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitViolation {
    #[error("Maximum input bytes exceeded for {platform}: {actual} > {limit}")]
    MaxInputBytes {
        platform: String,
        actual: u64,
        limit: u64,
    },
}
