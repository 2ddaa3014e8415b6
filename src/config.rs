//! Configuration for copyguard.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (COPYGUARD_HOME, COPYGUARD_MAX_REVISIONS)
//! 2. Config file (.copyguard/config.yaml)
//! 3. Defaults (~/.copyguard)
//!
//! Config file discovery:
//! - Searches current directory and parents for .copyguard/config.yaml
//! - `paths.home` in the config file is relative to the .copyguard/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::limits::ComplianceLimits;
use crate::detector::DetectionPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".copyguard";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
    #[serde(default)]
    pub brand: BrandParams,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .copyguard/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplianceConfig {
    pub max_revisions: Option<u32>,
    pub acceptance_threshold: Option<f64>,
    pub score_threshold: Option<f64>,
    pub max_input_bytes: Option<u64>,
    pub generation_timeout_seconds: Option<u64>,
}

/// Externally supplied brand-voice parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandParams {
    /// Terms the brand wants to see in its copy
    #[serde(default)]
    pub vocabulary: Vec<String>,

    /// Idioms the brand uses deliberately; matches overlapping them are discounted
    #[serde(default)]
    pub allow_list: Vec<String>,
}

impl BrandParams {
    pub fn detection_policy(&self, acceptance_threshold: f64) -> DetectionPolicy {
        DetectionPolicy {
            allow_list: self.allow_list.clone(),
            brand_vocabulary: self.vocabulary.clone(),
            acceptance_threshold,
        }
    }
}

/// Which generator backend performs regeneration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    Fabric,
    Openrouter,
}

impl Default for GeneratorBackend {
    fn default() -> Self {
        Self::Fabric
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub backend: GeneratorBackend,

    /// Fabric pattern used for rewrites
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Chat model for the HTTP backend
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_pattern() -> String {
    "improve_writing".to_string()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    crate::adapters::DEFAULT_TEMPERATURE
}
fn default_max_retries() -> u32 {
    3
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::default(),
            pattern: default_pattern(),
            model: default_model(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to copyguard home (run journals)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub limits: ComplianceLimits,
    pub acceptance_threshold: f64,
    pub score_threshold: f64,
    pub brand: BrandParams,
    pub generator: GeneratorConfig,
}

impl ResolvedConfig {
    /// Configuration built from defaults only, rooted at `home`
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            home,
            config_file: None,
            limits: ComplianceLimits::default(),
            acceptance_threshold: 0.5,
            score_threshold: 0.75,
            brand: BrandParams::default(),
            generator: GeneratorConfig::default(),
        }
    }

    pub fn brand_params(&self) -> &BrandParams {
        &self.brand
    }

    pub fn limits(&self) -> &ComplianceLimits {
        &self.limits
    }

    pub fn detection_policy(&self) -> DetectionPolicy {
        self.brand.detection_policy(self.acceptance_threshold)
    }

    /// Directory holding all run journals ($COPYGUARD_HOME/runs)
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    /// Journal directory for one run
    pub fn journal_dir(&self, run_id: Uuid) -> PathBuf {
        self.runs_dir().join(run_id.to_string())
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment overrides, read once per load
struct EnvOverrides {
    home: Option<PathBuf>,
    max_revisions: Option<u32>,
}

impl EnvOverrides {
    fn from_env() -> Result<Self> {
        let max_revisions = match std::env::var("COPYGUARD_MAX_REVISIONS") {
            Ok(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid COPYGUARD_MAX_REVISIONS: {}", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            home: std::env::var("COPYGUARD_HOME").ok().map(PathBuf::from),
            max_revisions,
        })
    }
}

/// Load configuration, discovering the config file from `start`
fn load_config_from(start: &Path, env: EnvOverrides) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file(start);
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let home = if let Some(env_home) = env.home {
        env_home
    } else if let (Some(home_path), Some(config_path)) = (&file.paths.home, &config_file) {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let defaults = ComplianceLimits::default();
    let compliance = &file.compliance;
    let limits = ComplianceLimits {
        max_revisions: env
            .max_revisions
            .or(compliance.max_revisions)
            .unwrap_or(defaults.max_revisions),
        max_input_bytes: compliance.max_input_bytes.unwrap_or(defaults.max_input_bytes),
        generation_timeout_seconds: compliance
            .generation_timeout_seconds
            .unwrap_or(defaults.generation_timeout_seconds),
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        limits,
        acceptance_threshold: compliance.acceptance_threshold.unwrap_or(0.5),
        score_threshold: compliance.score_threshold.unwrap_or(0.75),
        brand: file.brand,
        generator: file.generator,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd, EnvOverrides::from_env()?)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the copyguard home directory
pub fn copyguard_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the runs directory ($COPYGUARD_HOME/runs)
pub fn runs_dir() -> Result<PathBuf> {
    Ok(config()?.runs_dir())
}
