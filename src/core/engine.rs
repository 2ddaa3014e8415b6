//! Compliance engine.
//!
//! Drives one piece of copy through the detect → decide → repair loop:
//!
//! 1. Detect violations in the current text
//! 2. Let [`ComplianceState`] decide `Pass`, `Revise` or `ManualReview`
//! 3. On `Revise`, sanitize; if the sanitizer leaves residual kinds and a
//!    generator is configured, ask it for a rewrite naming those kinds
//! 4. Commit every text change as a new version
//!
//! The loop runs at most `max_revisions + 1` times. Several platforms are
//! processed as independent tasks that share one version store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::task::{self, JoinSet};
use tracing::{info, instrument, warn};

use crate::adapters::{
    build_revision_prompt, generator_from_config, GenerationError, GenerationRequest, Generator,
    DEFAULT_TEMPERATURE,
};
use crate::config::{BrandParams, ResolvedConfig};
use crate::detector::Detector;
use crate::domain::{
    AttemptRecord, ComplianceState, ComplianceStatus, PlatformContent, SinKind, Version, VersionAction,
    VersionId, Violation, ViolationReport,
};

use super::limits::{ComplianceLimits, LimitViolation};
use super::sanitizer::{SanitizeError, Sanitizer};
use super::scorer::{AuthenticityScore, AuthenticityScorer};
use super::version_store::{VersionStore, VersionStoreError};

/// Errors that abort a compliance run.
///
/// Residual violations are not errors: they end in `ManualReview`.
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error(transparent)]
    Limit(#[from] LimitViolation),

    #[error(transparent)]
    VersionStore(#[from] VersionStoreError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("Compliance task for '{platform}' failed: {message}")]
    Task { platform: String, message: String },
}

/// Result of running one piece through the engine
#[derive(Debug, Clone)]
pub struct ComplianceOutcome {
    pub platform: String,

    /// Last text produced (best effort when `status` is `ManualReview`)
    pub final_text: String,

    /// Violations remaining in `final_text`
    pub report: ViolationReport,

    /// Versions committed for this piece, oldest first
    pub versions: Vec<Arc<Version>>,

    pub status: ComplianceStatus,

    pub attempts: Vec<AttemptRecord>,

    /// Kinds still present when the budget ran out
    pub persisted_kinds: BTreeSet<SinKind>,

    pub score: AuthenticityScore,
}

impl ComplianceOutcome {
    pub fn is_pass(&self) -> bool {
        self.status == ComplianceStatus::Pass
    }

    /// Number of `Revise` decisions taken
    pub fn revision_count(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.status == ComplianceStatus::Revise)
            .count()
    }

    /// Newest version of this piece
    pub fn head(&self) -> Option<VersionId> {
        self.versions.last().map(|v| v.version_id)
    }
}

/// Result of running several platforms together
#[derive(Debug, Clone)]
pub struct ComplianceSetOutcome {
    pub outcomes: BTreeMap<String, ComplianceOutcome>,

    /// Root version holding every platform's final text
    pub aggregate: Arc<Version>,

    /// `Pass` only when every piece passed
    pub status: ComplianceStatus,

    pub report: ViolationReport,
}

/// Compliance engine. Cheap to clone; clones share the version store.
#[derive(Clone)]
pub struct ComplianceEngine {
    limits: ComplianceLimits,
    acceptance_threshold: f64,
    scorer: AuthenticityScorer,
    brand: BrandParams,
    generator: Option<Arc<dyn Generator>>,
    /// Sampling temperature sent with every regeneration request
    temperature: f64,
    store: Arc<VersionStore>,
}

impl fmt::Debug for ComplianceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplianceEngine")
            .field("limits", &self.limits)
            .field("acceptance_threshold", &self.acceptance_threshold)
            .field("brand", &self.brand)
            .field("generator", &self.generator.as_ref().map(|g| g.name().to_string()))
            .field("temperature", &self.temperature)
            .field("versions", &self.store.len())
            .finish()
    }
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::new(ComplianceLimits::default())
    }
}

impl ComplianceEngine {
    /// Engine without a generator: residual violations are only retried by
    /// the sanitizer on the next attempt.
    pub fn new(limits: ComplianceLimits) -> Self {
        Self {
            limits,
            acceptance_threshold: 0.5,
            scorer: AuthenticityScorer::default(),
            brand: BrandParams::default(),
            generator: None,
            temperature: DEFAULT_TEMPERATURE,
            store: Arc::new(VersionStore::new()),
        }
    }

    /// Engine wired from resolved configuration, including its generator
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let generator: Arc<dyn Generator> = Arc::from(generator_from_config(&config.generator)?);

        Ok(Self::new(config.limits().clone())
            .with_acceptance_threshold(config.acceptance_threshold)
            .with_score_threshold(config.score_threshold)
            .with_brand(config.brand_params().clone())
            .with_temperature(config.generator.temperature)
            .with_generator(generator))
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_store(mut self, store: Arc<VersionStore>) -> Self {
        self.store = store;
        self
    }

    /// Brand parameters used by [`ComplianceEngine::run_compliance_set`]
    pub fn with_brand(mut self, brand: BrandParams) -> Self {
        self.brand = brand;
        self
    }

    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.scorer = AuthenticityScorer::new(threshold);
        self
    }

    pub fn limits(&self) -> &ComplianceLimits {
        &self.limits
    }

    pub fn store(&self) -> &Arc<VersionStore> {
        &self.store
    }

    /// Run one piece to a terminal status.
    #[instrument(skip(self, text, brand), fields(bytes = text.len()))]
    pub async fn run_compliance(
        &self,
        platform: &str,
        text: &str,
        max_revisions: u32,
        brand: &BrandParams,
    ) -> Result<ComplianceOutcome, ComplianceError> {
        self.limits.validate_input(platform, text)?;

        let detector = Detector::new(brand.detection_policy(self.acceptance_threshold));
        let sanitizer = Sanitizer::new(&detector);
        let mut state = ComplianceState::new(max_revisions);

        let mut current = text.to_string();
        let mut head = self.store.commit(None, single(platform, &current), None, BTreeSet::new(), Vec::new())?;
        let mut version_ids = vec![head];
        let mut attempts = Vec::new();
        let mut persisted_kinds = BTreeSet::new();
        let mut violations = detector.detect(&current);

        for attempt in 0..=max_revisions {
            let status = state.evaluate(&violations);
            info!(
                attempt,
                revision_count = state.revision_count(),
                violations = violations.len(),
                ?status,
                "Compliance decision"
            );

            let mut record = AttemptRecord {
                attempt,
                status,
                violations: violations.clone(),
                version_id: None,
                residual: BTreeSet::new(),
                generation_error: None,
            };

            match status {
                ComplianceStatus::Pass | ComplianceStatus::Pending => {
                    attempts.push(record);
                    break;
                }
                ComplianceStatus::ManualReview => {
                    persisted_kinds = kinds(&violations);
                    warn!(
                        attempts = attempt + 1,
                        persisted = ?persisted_kinds,
                        "Revision budget exhausted, manual review required"
                    );

                    let feedback = format!(
                        "Manual review after {} attempts; persisted: {}",
                        attempt + 1,
                        join_kinds(&persisted_kinds)
                    );
                    head = self.store.commit_or_rebase(
                        Some(head),
                        single(platform, &current),
                        Some(feedback),
                        BTreeSet::new(),
                        Vec::new(),
                        VersionAction::ManualReview,
                    )?;
                    version_ids.push(head);
                    record.version_id = Some(head);
                    attempts.push(record);
                    break;
                }
                ComplianceStatus::Revise => {}
            }

            let before = kinds(&violations);
            let (sanitized, log, residual) = match sanitizer.sanitize(&current, &violations) {
                Ok((sanitized, log)) => (sanitized, log, BTreeSet::new()),
                Err(SanitizeError::SanitizationIncomplete { residual, text, log, .. }) => {
                    warn!(?residual, "Sanitization incomplete");
                    (text, log, residual)
                }
                Err(e) => return Err(e.into()),
            };
            record.residual = residual.clone();

            if sanitized != current {
                let remaining = kinds(&detector.detect(&sanitized));
                head = self.store.commit_or_rebase(
                    Some(head),
                    single(platform, &sanitized),
                    None,
                    before.difference(&remaining).copied().collect(),
                    log,
                    VersionAction::Sanitized,
                )?;
                version_ids.push(head);
                record.version_id = Some(head);
                current = sanitized;
            }

            if !residual.is_empty() {
                if let Some(generator) = &self.generator {
                    match self.regenerate(generator.as_ref(), platform, &current, &residual, brand).await {
                        Ok(regenerated) if regenerated != current => {
                            let remaining = kinds(&detector.detect(&regenerated));
                            head = self.store.commit_or_rebase(
                                Some(head),
                                single(platform, &regenerated),
                                Some(format!("Regenerated by {}", generator.name())),
                                before.difference(&remaining).copied().collect(),
                                Vec::new(),
                                VersionAction::Regenerated,
                            )?;
                            version_ids.push(head);
                            record.version_id = Some(head);
                            current = regenerated;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(generator = generator.name(), error = %e, "Generation failed, keeping best-effort text");
                            record.generation_error = Some(e.to_string());
                        }
                    }
                }
            }

            attempts.push(record);
            violations = detector.detect(&current);
        }

        let versions = version_ids
            .iter()
            .map(|id| self.store.get(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = ViolationReport::new();
        report.insert(platform, violations.clone());
        let score = self.scorer.score(&current, &violations, brand);

        Ok(ComplianceOutcome {
            platform: platform.to_string(),
            final_text: current,
            report,
            versions,
            status: state.status(),
            attempts,
            persisted_kinds,
            score,
        })
    }

    /// Run every platform concurrently and commit an aggregate version.
    #[instrument(skip(self, pieces), fields(platforms = pieces.len()))]
    pub async fn run_compliance_set(
        &self,
        pieces: BTreeMap<String, String>,
    ) -> Result<ComplianceSetOutcome, ComplianceError> {
        // Reject oversized input before any work starts
        for (platform, text) in &pieces {
            self.limits.validate_input(platform, text)?;
        }

        let max_revisions = self.limits.max_revisions;
        let mut tasks = JoinSet::new();
        let mut task_platforms: HashMap<task::Id, String> = HashMap::new();
        for (platform, text) in pieces {
            let engine = self.clone();
            let task_platform = platform.clone();
            let handle = tasks.spawn(async move {
                engine
                    .run_compliance(&platform, &text, max_revisions, &engine.brand)
                    .await
            });
            task_platforms.insert(handle.id(), task_platform);
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = joined.map_err(|e| ComplianceError::Task {
                platform: task_platforms.get(&e.id()).cloned().unwrap_or_default(),
                message: e.to_string(),
            })?;
            let platform = task_platforms.remove(&id).unwrap_or_default();
            outcomes.insert(platform, result?);
        }

        let mut content = PlatformContent::new();
        let mut report = ViolationReport::new();
        for (platform, outcome) in &outcomes {
            content.insert(platform.clone(), outcome.final_text.clone());
            report.insert(platform.clone(), outcome.report.get(platform).to_vec());
        }

        let status = if outcomes.values().all(ComplianceOutcome::is_pass) {
            ComplianceStatus::Pass
        } else {
            ComplianceStatus::ManualReview
        };

        let fixed = outcomes
            .values()
            .flat_map(|o| o.versions.iter())
            .flat_map(|v| v.violations_fixed.iter().copied())
            .collect();
        let aggregate_id = self.store.commit_with_action(
            None,
            content,
            Some(format!("Aggregate of {} platforms", outcomes.len())),
            fixed,
            Vec::new(),
            VersionAction::Aggregate,
        )?;

        info!(%aggregate_id, ?status, "Compliance set complete");

        Ok(ComplianceSetOutcome {
            aggregate: self.store.get(aggregate_id)?,
            outcomes,
            status,
            report,
        })
    }

    /// Ask the generator for a rewrite, bounded by the generation timeout
    async fn regenerate(
        &self,
        generator: &dyn Generator,
        platform: &str,
        text: &str,
        residual: &BTreeSet<SinKind>,
        brand: &BrandParams,
    ) -> Result<String, GenerationError> {
        let request = GenerationRequest::new(platform, build_revision_prompt(text, residual, brand))
            .with_temperature(self.temperature);
        let timeout = self.limits.generation_timeout();

        let regenerated = match tokio::time::timeout(timeout, generator.generate(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(GenerationError::Timeout {
                    generator: generator.name().to_string(),
                    seconds: timeout.as_secs(),
                })
            }
        };

        if let Err(e) = self.limits.validate_input(platform, &regenerated) {
            return Err(GenerationError::Failed {
                generator: generator.name().to_string(),
                message: e.to_string(),
            });
        }

        Ok(regenerated)
    }
}

fn single(platform: &str, text: &str) -> PlatformContent {
    let mut content = PlatformContent::new();
    content.insert(platform.to_string(), text.to_string());
    content
}

fn kinds(violations: &[Violation]) -> BTreeSet<SinKind> {
    violations.iter().map(|v| v.kind).collect()
}

fn join_kinds(kinds: &BTreeSet<SinKind>) -> String {
    kinds.iter().map(SinKind::as_str).collect::<Vec<_>>().join(", ")
}
