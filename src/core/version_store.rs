//! Append-only version store.
//!
//! Versions are immutable once committed and shared as `Arc<Version>`.
//! Commits take the write lock, so id allocation and parent linkage are
//! serialized; reads only take the read lock.
//!
//! Chains are linear: a parent may have at most one child. Committing onto a
//! parent that already has a child is a [`VersionStoreError::Conflict`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    content_digest, PlatformContent, SinKind, TransformationRecord, Version, VersionAction, VersionId,
};

/// Version store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionStoreError {
    #[error("Version not found: {0}")]
    NotFound(VersionId),

    #[error("Unknown parent version: {0}")]
    UnknownParent(VersionId),

    #[error("Version conflict: {parent} already has a child, chain head is {head}")]
    Conflict { parent: VersionId, head: VersionId },

    #[error("Corrupt history at {id}: {reason}")]
    Corrupt { id: VersionId, reason: String },

    #[error("Version store lock poisoned")]
    Poisoned,
}

/// Walk direction for [`VersionStore::history`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    NewestFirst,
    OldestFirst,
}

/// How one platform's text differs between two versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum PlatformChange {
    Added { text: String },
    Removed { text: String },
    Modified {
        before: String,
        after: String,
        length_delta: i64,
    },
}

/// Per-platform differences between two versions (unchanged platforms omitted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub from: VersionId,
    pub to: VersionId,
    pub changes: BTreeMap<String, PlatformChange>,
}

impl VersionComparison {
    pub fn is_identical(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Aggregate statistics over every committed version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionAnalytics {
    pub total_versions: usize,
    pub by_action: BTreeMap<VersionAction, usize>,
    pub kinds_fixed: BTreeMap<SinKind, usize>,
    pub transformations: usize,
    pub first_created: Option<DateTime<Utc>>,
    pub last_created: Option<DateTime<Utc>>,
}

impl VersionAnalytics {
    /// Seconds between the first and last commit
    pub fn processing_seconds(&self) -> i64 {
        match (self.first_created, self.last_created) {
            (Some(first), Some(last)) => (last - first).num_seconds(),
            _ => 0,
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    versions: Vec<Arc<Version>>,
    children: HashMap<VersionId, VersionId>,
}

impl StoreInner {
    fn get(&self, id: VersionId) -> Option<&Arc<Version>> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.versions.get(index)
    }

    fn next_id(&self) -> VersionId {
        VersionId(self.versions.len() as u64 + 1)
    }

    /// Follow child links to the end of the chain
    fn head_of(&self, mut id: VersionId) -> VersionId {
        while let Some(child) = self.children.get(&id) {
            id = *child;
        }
        id
    }

    fn push(&mut self, version: Version) {
        if let Some(parent) = version.parent_id {
            self.children.insert(parent, version.version_id);
        }
        self.versions.push(Arc::new(version));
    }
}

/// Single-writer, append-only store of content snapshots
#[derive(Debug, Default)]
pub struct VersionStore {
    inner: RwLock<StoreInner>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously committed versions (e.g. a journal
    /// replay), checking ids, linkage and digests.
    pub fn from_versions(versions: Vec<Version>) -> Result<Self, VersionStoreError> {
        let mut inner = StoreInner::default();

        for version in versions {
            let id = version.version_id;
            let corrupt = |reason: &str| VersionStoreError::Corrupt {
                id,
                reason: reason.to_string(),
            };

            if id != inner.next_id() {
                return Err(corrupt("version ids are not sequential"));
            }
            if let Some(parent) = version.parent_id {
                if parent >= id || inner.get(parent).is_none() {
                    return Err(corrupt("parent does not precede version"));
                }
                if inner.children.contains_key(&parent) {
                    return Err(corrupt("parent already has a child"));
                }
            }
            if !version.digest_matches() {
                return Err(corrupt("content digest mismatch"));
            }

            inner.push(version);
        }

        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Commit a version. Roots are tagged `Initial`, children `Sanitized`.
    pub fn commit(
        &self,
        parent: Option<VersionId>,
        content: PlatformContent,
        feedback: Option<String>,
        violations_fixed: BTreeSet<SinKind>,
        transformation_log: Vec<TransformationRecord>,
    ) -> Result<VersionId, VersionStoreError> {
        let action = match parent {
            None => VersionAction::Initial,
            Some(_) => VersionAction::Sanitized,
        };
        self.commit_with_action(parent, content, feedback, violations_fixed, transformation_log, action)
    }

    pub fn commit_with_action(
        &self,
        parent: Option<VersionId>,
        content: PlatformContent,
        feedback: Option<String>,
        violations_fixed: BTreeSet<SinKind>,
        transformation_log: Vec<TransformationRecord>,
        action: VersionAction,
    ) -> Result<VersionId, VersionStoreError> {
        let mut inner = self.inner.write().map_err(|_| VersionStoreError::Poisoned)?;

        if let Some(parent) = parent {
            if inner.get(parent).is_none() {
                return Err(VersionStoreError::UnknownParent(parent));
            }
            if inner.children.contains_key(&parent) {
                return Err(VersionStoreError::Conflict {
                    parent,
                    head: inner.head_of(parent),
                });
            }
        }

        let version_id = inner.next_id();
        let content_digest = content_digest(&content);
        inner.push(Version {
            version_id,
            parent_id: parent,
            content,
            created_at: Utc::now(),
            feedback,
            violations_fixed,
            transformation_log,
            action,
            content_digest,
        });

        debug!(%version_id, ?action, "Committed version");
        Ok(version_id)
    }

    /// Commit, retrying once on the chain head if the parent already moved on
    pub fn commit_or_rebase(
        &self,
        parent: Option<VersionId>,
        content: PlatformContent,
        feedback: Option<String>,
        violations_fixed: BTreeSet<SinKind>,
        transformation_log: Vec<TransformationRecord>,
        action: VersionAction,
    ) -> Result<VersionId, VersionStoreError> {
        match self.commit_with_action(
            parent,
            content.clone(),
            feedback.clone(),
            violations_fixed.clone(),
            transformation_log.clone(),
            action,
        ) {
            Err(VersionStoreError::Conflict { parent, head }) => {
                warn!(%parent, %head, "Version conflict, rebasing onto chain head");
                self.commit_with_action(Some(head), content, feedback, violations_fixed, transformation_log, action)
            }
            other => other,
        }
    }

    pub fn get(&self, id: VersionId) -> Result<Arc<Version>, VersionStoreError> {
        let inner = self.inner.read().map_err(|_| VersionStoreError::Poisoned)?;
        inner.get(id).cloned().ok_or(VersionStoreError::NotFound(id))
    }

    /// Walk parent links from `from` back to its root
    pub fn history(&self, from: VersionId, order: HistoryOrder) -> Result<Vec<Arc<Version>>, VersionStoreError> {
        let inner = self.inner.read().map_err(|_| VersionStoreError::Poisoned)?;

        let mut chain = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let version = inner.get(id).ok_or(VersionStoreError::NotFound(id))?;
            cursor = version.parent_id;
            chain.push(Arc::clone(version));
        }

        if order == HistoryOrder::OldestFirst {
            chain.reverse();
        }
        Ok(chain)
    }

    /// Most recently committed version
    pub fn latest(&self) -> Option<Arc<Version>> {
        self.inner.read().ok()?.versions.last().cloned()
    }

    /// Last version on the chain containing `id`
    pub fn head_of(&self, id: VersionId) -> Result<VersionId, VersionStoreError> {
        let inner = self.inner.read().map_err(|_| VersionStoreError::Poisoned)?;
        if inner.get(id).is_none() {
            return Err(VersionStoreError::NotFound(id));
        }
        Ok(inner.head_of(id))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.versions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every version in commit order
    pub fn all(&self) -> Vec<Arc<Version>> {
        self.inner
            .read()
            .map(|inner| inner.versions.clone())
            .unwrap_or_default()
    }

    /// Re-commit the content of `to` on top of its chain
    pub fn rollback(&self, to: VersionId, feedback: Option<String>) -> Result<VersionId, VersionStoreError> {
        let target = self.get(to)?;
        let head = self.head_of(to)?;
        let feedback = feedback.or_else(|| Some(format!("Rollback to {}", to)));

        self.commit_or_rebase(
            Some(head),
            target.content.clone(),
            feedback,
            BTreeSet::new(),
            Vec::new(),
            VersionAction::Rollback,
        )
    }

    /// Per-platform differences from `a` to `b`
    pub fn compare(&self, a: VersionId, b: VersionId) -> Result<VersionComparison, VersionStoreError> {
        let from = self.get(a)?;
        let to = self.get(b)?;
        let mut changes = BTreeMap::new();

        for (platform, before) in &from.content {
            match to.content.get(platform) {
                None => {
                    changes.insert(platform.clone(), PlatformChange::Removed { text: before.clone() });
                }
                Some(after) if after != before => {
                    changes.insert(
                        platform.clone(),
                        PlatformChange::Modified {
                            before: before.clone(),
                            after: after.clone(),
                            length_delta: after.len() as i64 - before.len() as i64,
                        },
                    );
                }
                Some(_) => {}
            }
        }
        for (platform, after) in &to.content {
            if !from.content.contains_key(platform) {
                changes.insert(platform.clone(), PlatformChange::Added { text: after.clone() });
            }
        }

        Ok(VersionComparison { from: a, to: b, changes })
    }

    pub fn analytics(&self) -> VersionAnalytics {
        let versions = self.all();
        let mut analytics = VersionAnalytics {
            total_versions: versions.len(),
            ..VersionAnalytics::default()
        };

        for version in &versions {
            *analytics.by_action.entry(version.action).or_insert(0) += 1;
            for kind in &version.violations_fixed {
                *analytics.kinds_fixed.entry(*kind).or_insert(0) += 1;
            }
            analytics.transformations += version.transformation_log.len();
        }

        analytics.first_created = versions.iter().map(|v| v.created_at).min();
        analytics.last_created = versions.iter().map(|v| v.created_at).max();
        analytics
    }

    /// Recompute every digest and check linkage
    pub fn verify(&self) -> Result<(), VersionStoreError> {
        let versions = self.all();
        for (index, version) in versions.iter().enumerate() {
            let id = version.version_id;
            if id.0 != index as u64 + 1 {
                return Err(VersionStoreError::Corrupt {
                    id,
                    reason: "version ids are not sequential".to_string(),
                });
            }
            if version.parent_id.map_or(false, |parent| parent >= id) {
                return Err(VersionStoreError::Corrupt {
                    id,
                    reason: "parent does not precede version".to_string(),
                });
            }
            if !version.digest_matches() {
                return Err(VersionStoreError::Corrupt {
                    id,
                    reason: "content digest mismatch".to_string(),
                });
            }
        }
        Ok(())
    }
}
