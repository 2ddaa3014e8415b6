//! Immutable content snapshots.
//!
//! A [`Version`] is created once by the version store and never mutated.
//! Versions link to their parent to form an auditable revision chain.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::violation::{SinKind, TextSpan};

/// Monotonically increasing version identifier, unique within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub u64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Content keyed by platform identifier
pub type PlatformContent = BTreeMap<String, String>;

/// What produced a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionAction {
    /// First snapshot of submitted content
    Initial,

    /// Deterministic sanitizer rewrite
    Sanitized,

    /// Text returned by the external generator
    Regenerated,

    /// Revision budget exhausted; snapshot kept for human inspection
    ManualReview,

    /// Older content re-committed on top of the chain
    Rollback,

    /// Final texts of several platform chains combined
    Aggregate,
}

impl Default for VersionAction {
    fn default() -> Self {
        Self::Initial
    }
}

/// One rewrite applied by the sanitizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationRecord {
    #[serde(rename = "kind")]
    pub violation_kind: SinKind,

    /// Span of the violation in the text the rewrite was applied to
    pub original_span: TextSpan,

    pub replacement_text: String,

    /// Identifier of the rewrite rule (e.g. "em_dash.comma")
    pub rule_id: String,
}

/// An immutable content snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub version_id: VersionId,

    pub parent_id: Option<VersionId>,

    /// Platform identifier -> text
    pub content: PlatformContent,

    /// When this version was committed (ISO 8601)
    pub created_at: DateTime<Utc>,

    /// Caller feedback that led to this version
    pub feedback: Option<String>,

    #[serde(default)]
    pub violations_fixed: BTreeSet<SinKind>,

    #[serde(rename = "transformations", default)]
    pub transformation_log: Vec<TransformationRecord>,

    #[serde(default)]
    pub action: VersionAction,

    /// "sha256:<hex>" over the canonical content
    pub content_digest: String,
}

impl Version {
    /// Text for one platform
    pub fn text(&self, platform: &str) -> Option<&str> {
        self.content.get(platform).map(String::as_str)
    }

    /// Whether the stored digest still matches the content
    pub fn digest_matches(&self) -> bool {
        self.content_digest == content_digest(&self.content)
    }
}

/// Digest over platform content.
///
/// Entries are fed in key order with length prefixes so that different
/// splits of the same bytes never collide.
pub fn content_digest(content: &PlatformContent) -> String {
    let mut hasher = Sha256::new();
    for (platform, text) in content {
        hasher.update((platform.len() as u64).to_le_bytes());
        hasher.update(platform.as_bytes());
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_version() -> Version {
        let mut content = PlatformContent::new();
        content.insert("linkedin".to_string(), "We grew fast.".to_string());
        let digest = content_digest(&content);

        Version {
            version_id: VersionId(2),
            parent_id: Some(VersionId(1)),
            content,
            created_at: Utc::now(),
            feedback: Some("tighten it".to_string()),
            violations_fixed: [SinKind::EmDash].into_iter().collect(),
            transformation_log: vec![TransformationRecord {
                violation_kind: SinKind::EmDash,
                original_span: TextSpan::new(8, 11).unwrap(),
                replacement_text: ", ".to_string(),
                rule_id: "em_dash.comma".to_string(),
            }],
            action: VersionAction::Sanitized,
            content_digest: digest,
        }
    }

    #[test]
    fn test_version_persisted_layout() {
        let version = sample_version();
        let value = serde_json::to_value(&version).unwrap();

        assert_eq!(value["version_id"], 2);
        assert_eq!(value["parent_id"], 1);
        assert_eq!(value["violations_fixed"][0], "em_dash");
        assert_eq!(value["transformations"][0]["kind"], "em_dash");
        assert_eq!(value["transformations"][0]["rule_id"], "em_dash.comma");
        assert_eq!(value["transformations"][0]["original_span"][0], 8);
        assert_eq!(value["transformations"][0]["original_span"][1], 11);
        assert!(value["created_at"].as_str().unwrap().contains('T'));

        let parsed: Version = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, version);
    }

    #[test]
    fn test_digest_detects_changes() {
        let mut version = sample_version();
        assert!(version.digest_matches());

        version
            .content
            .insert("linkedin".to_string(), "We grew slowly.".to_string());
        assert!(!version.digest_matches());
    }

    #[test]
    fn test_digest_is_split_sensitive() {
        let mut a = PlatformContent::new();
        a.insert("ab".to_string(), "c".to_string());
        let mut b = PlatformContent::new();
        b.insert("a".to_string(), "bc".to_string());
        assert_ne!(content_digest(&a), content_digest(&b));
    }
}
