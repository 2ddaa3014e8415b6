//! Version journal with file-based persistence.
//!
//! Committed versions are stored as newline-delimited JSON (JSONL), one
//! [`Version`] per line in commit order, under
//! `$COPYGUARD_HOME/runs/<run_id>/versions.jsonl`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;
use uuid::Uuid;

use crate::core::version_store::VersionStore;
use crate::domain::Version;

const JOURNAL_FILE: &str = "versions.jsonl";

/// Append-only JSONL journal of committed versions
#[derive(Debug, Clone)]
pub struct VersionJournal {
    /// Directory containing the run
    run_dir: PathBuf,

    /// Path to the versions.jsonl file
    path: PathBuf,
}

impl VersionJournal {
    /// Create or open a journal in `run_dir`
    pub fn open(run_dir: impl Into<PathBuf>) -> Result<Self> {
        let run_dir = run_dir.into();
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        let path = run_dir.join(JOURNAL_FILE);
        Ok(Self { run_dir, path })
    }

    /// Open the journal for a run under the configured home
    pub fn open_run(run_id: Uuid) -> Result<Self> {
        Self::open(crate::config::config()?.journal_dir(run_id))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Append one version under an exclusive file lock
    pub fn append(&self, version: &Version) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire file lock on versions.jsonl")?;

        let json = serde_json::to_string(version).context("Failed to serialize version")?;

        let mut file = file;
        writeln!(file, "{}", json).context("Failed to write version")?;
        file.flush().context("Failed to flush version")?;

        debug!(version_id = %version.version_id, "Journaled version");
        // Lock is released when file is dropped
        Ok(())
    }

    /// Append several versions in order
    pub fn append_all<'a>(&self, versions: impl IntoIterator<Item = &'a Version>) -> Result<usize> {
        let mut count = 0;
        for version in versions {
            self.append(version)?;
            count += 1;
        }
        Ok(count)
    }

    /// Read every journaled version in order
    pub fn replay(&self) -> Result<Vec<Version>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let mut versions = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("Failed to read journal line")?;
            if line.trim().is_empty() {
                continue;
            }
            let version: Version = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse version on line {}", index + 1))?;
            versions.push(version);
        }

        Ok(versions)
    }

    /// Rebuild a verified version store from the journal
    pub fn load_store(&self) -> Result<VersionStore> {
        let versions = self.replay()?;
        VersionStore::from_versions(versions)
            .with_context(|| format!("Journal failed verification: {}", self.path.display()))
    }

    /// List all run IDs under `runs_dir`
    pub fn list_runs(runs_dir: &Path) -> Result<Vec<Uuid>> {
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(runs_dir)
            .with_context(|| format!("Failed to read runs directory: {}", runs_dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(uuid) = entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) {
                    runs.push(uuid);
                }
            }
        }

        runs.sort();
        Ok(runs)
    }
}
