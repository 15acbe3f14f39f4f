//! Configuration loading for TrialScope.
//! Reads trialscope.toml from the current directory or the path in the
//! TRIALSCOPE_CONFIG env var. Every field has a default, so a missing file
//! or section is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trialscope_common::DataPaths;

pub const DEFAULT_CONFIG_PATH: &str = "trialscope.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub clinicaltrials: ClinicalTrialsConfig,
    #[serde(default)]
    pub filings: FilingsConfig,
    #[serde(default)]
    pub publications: PublicationsConfig,
    #[serde(default)]
    pub literature: LiteratureConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_root")]
    pub root: PathBuf,
}

fn default_data_root() -> PathBuf { PathBuf::from("data") }

impl Default for DataConfig {
    fn default() -> Self {
        Self { root: default_data_root() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTrialsConfig {
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default = "default_trial_limit")]
    pub limit: usize,
    /// Only studies started within this many months are kept.
    #[serde(default = "default_start_window")]
    pub start_window_months: u32,
    #[serde(default = "default_registry_delay")]
    pub delay_ms: u64,
}

fn default_condition()      -> String { "Pulmonary Arterial Hypertension".to_string() }
fn default_trial_limit()    -> usize  { 5 }
fn default_start_window()   -> u32    { 120 }
fn default_registry_delay() -> u64    { 300 }

impl Default for ClinicalTrialsConfig {
    fn default() -> Self {
        Self {
            condition: default_condition(),
            limit: default_trial_limit(),
            start_window_months: default_start_window(),
            delay_ms: default_registry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingsConfig {
    /// Financial Modeling Prep key. Falls back to FMP_API_KEY.
    pub api_key: Option<String>,
    #[serde(default = "default_forms")]
    pub forms: Vec<String>,
    #[serde(default = "default_limit_per_form")]
    pub limit_per_form: usize,
    #[serde(default = "default_registry_delay")]
    pub delay_ms: u64,
}

fn default_forms() -> Vec<String> {
    vec!["10-K".to_string(), "8-K".to_string()]
}
fn default_limit_per_form() -> usize { 3 }

impl Default for FilingsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            forms: default_forms(),
            limit_per_form: default_limit_per_form(),
            delay_ms: default_registry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationsConfig {
    /// Custom Search key. Falls back to GOOGLE_SEARCH_API_KEY.
    pub api_key: Option<String>,
    /// Custom Search engine id. Falls back to GOOGLE_SEARCH_ENGINE_ID.
    pub engine_id: Option<String>,
    #[serde(default = "default_publication_limit")]
    pub publication_limit: usize,
    #[serde(default = "default_presentation_limit")]
    pub presentation_limit: usize,
    #[serde(default = "default_search_delay")]
    pub delay_ms: u64,
}

fn default_publication_limit()  -> usize { 5 }
fn default_presentation_limit() -> usize { 3 }
fn default_search_delay()       -> u64   { 1000 }

impl Default for PublicationsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            publication_limit: default_publication_limit(),
            presentation_limit: default_presentation_limit(),
            delay_ms: default_search_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureConfig {
    /// Fall back to the reference table's `default` entry for unknown trials.
    #[serde(default = "bool_true")]
    pub use_default: bool,
    /// Replaces the built-in reference table.
    pub path: Option<PathBuf>,
}

fn bool_true() -> bool { true }

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self { use_default: true, path: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. Falls back to DATABASE_URL; unset means JSON files only.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TRIALSCOPE_BIND, when set, overrides this value.
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "0.0.0.0:8000".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

mod tests;

impl Config {
    /// Load configuration from `path`, TRIALSCOPE_CONFIG, or trialscope.toml,
    /// then fill unset secrets from the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("TRIALSCOPE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?
        } else {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults. Copy trialscope.example.toml to trialscope.toml to customise."
            );
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Fill unset or blank secrets from `lookup`; secrets in the file win.
    /// TRIALSCOPE_BIND, when set, overrides `server.bind`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fill(&mut self.filings.api_key, lookup("FMP_API_KEY"));
        fill(&mut self.publications.api_key, lookup("GOOGLE_SEARCH_API_KEY"));
        fill(&mut self.publications.engine_id, lookup("GOOGLE_SEARCH_ENGINE_ID"));
        fill(&mut self.database.url, lookup("DATABASE_URL"));
        if let Some(bind) = lookup("TRIALSCOPE_BIND").filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind;
        }
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data.root)
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    let unset = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if unset {
        *slot = value.filter(|v| !v.trim().is_empty());
    }
}
