//! Configuration for claimtrace.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CLAIMTRACE_HOME, CLAIMTRACE_REFERENCE)
//! 2. Config file (.claimtrace/config.yaml)
//! 3. Defaults (~/.claimtrace, built-in reference data)
//!
//! Config file discovery:
//! - Searches current directory and parents for .claimtrace/config.yaml
//! - Paths in config file are relative to the .claimtrace/ directory

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{
    EngineSettings, InputLimits, InvestigationOptions, Investigator, ScoringWeights,
    ValidationSettings,
};
use crate::domain::ReferenceData;
use crate::normalize::MatchSettings;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".claimtrace";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub investigation: Option<InvestigationOptions>,
    #[serde(default)]
    pub matching: Option<MatchSettings>,
    #[serde(default)]
    pub scoring: Option<ScoringWeights>,
    #[serde(default)]
    pub validation: Option<ValidationSettings>,
    #[serde(default)]
    pub limits: Option<InputLimits>,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .claimtrace/)
    pub home: Option<String>,
    /// Reference data file, YAML or JSON (relative to .claimtrace/)
    pub reference: Option<String>,
}

/// Environment overrides, read once per load
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<String>,
    pub reference: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            home: std::env::var("CLAIMTRACE_HOME").ok(),
            reference: std::env::var("CLAIMTRACE_REFERENCE").ok(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    /// Absolute path to claimtrace home
    pub home: PathBuf,
    /// Reference data file; `None` means the built-in set
    pub reference: Option<PathBuf>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Default investigation options
    pub investigation: InvestigationOptions,
    /// Matcher, scorer and validator settings
    pub engine: EngineSettings,
    pub limits: InputLimits,
}

impl ResolvedConfig {
    /// Load the configured reference data, or the built-in set
    pub fn load_reference(&self) -> Result<Arc<ReferenceData>> {
        let reference = match &self.reference {
            Some(path) => ReferenceData::load(path)
                .with_context(|| format!("Failed to load reference data: {}", path.display()))?,
            None => ReferenceData::builtin().context("Built-in reference data is invalid")?,
        };
        debug!(
            hospitals = reference.hospitals.len(),
            diagnoses = reference.diagnoses.len(),
            "reference data loaded"
        );
        Ok(Arc::new(reference))
    }

    /// Build an investigator from this configuration
    pub fn investigator(&self) -> Result<Investigator> {
        let reference = self.load_reference()?;
        Investigator::new(reference, self.engine.clone()).context("Invalid engine settings")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

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

/// Resolve a path that may be relative to the config directory
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

/// Resolve configuration from an optional config file and env overrides
fn resolve_config(config_file: Option<PathBuf>, env: &EnvOverrides) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let file = config_file.as_deref().map(load_config_file).transpose()?;
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = match (&env.home, file.as_ref().and_then(|f| f.paths.home.as_ref())) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(config_dir, home),
        (None, None) => default_home,
    };

    let reference = match (
        &env.reference,
        file.as_ref().and_then(|f| f.paths.reference.as_ref()),
    ) {
        (Some(env_reference), _) => Some(PathBuf::from(env_reference)),
        (None, Some(reference)) => Some(resolve_path(config_dir, reference)),
        (None, None) => None,
    };

    let (investigation, engine, limits) = match file {
        Some(file) => (
            file.investigation.unwrap_or_default(),
            EngineSettings {
                matching: file.matching.unwrap_or_default(),
                scoring: file.scoring.unwrap_or_default(),
                validation: file.validation.unwrap_or_default(),
            },
            file.limits.unwrap_or_default(),
        ),
        None => Default::default(),
    };

    Ok(ResolvedConfig {
        home,
        reference,
        config_file,
        investigation,
        engine,
        limits,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    resolve_config(find_config_file(), &EnvOverrides::from_env())
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

/// Get the claimtrace home directory
pub fn claimtrace_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}
