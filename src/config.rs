//! Scheduler configuration, read from `config.toml`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::RemovalPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Config {
    /// Marker directory at the root of a note corpus
    #[serde(default = "default_sentinel_dir")]
    pub sentinel_dir: String,
    /// Directory that holds the store, beside the sentinel
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
    #[serde(default = "default_store_file")]
    pub store_file: String,
    /// Glob patterns, relative to the corpus root, of trackable notes
    #[serde(default = "default_note_patterns")]
    pub note_patterns: Vec<String>,
    /// Ask the note tool for note paths instead of walking the corpus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_command: Option<Vec<String>>,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<usize>,
}

fn default_sentinel_dir() -> String {
    ".zk".to_string()
}

fn default_store_dir() -> String {
    ".recall".to_string()
}

fn default_store_file() -> String {
    "schedule.db".to_string()
}

fn default_note_patterns() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentinel_dir: default_sentinel_dir(),
            store_dir: default_store_dir(),
            store_file: default_store_file(),
            note_patterns: default_note_patterns(),
            list_command: None,
            removal_policy: RemovalPolicy::default(),
            default_limit: None,
        }
    }
}

impl Config {
    /// `<config dir>/recall/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("recall").join("config.toml"))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Like [`Config::load`], but a missing file means defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("sentinel_dir", &self.sentinel_dir),
            ("store_dir", &self.store_dir),
            ("store_file", &self.store_file),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
            if value.contains('/') || value.contains('\\') {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a single path component",
                    name
                )));
            }
        }

        if self.note_patterns.is_empty() {
            return Err(ConfigError::Invalid(
                "note_patterns must list at least one pattern".to_string(),
            ));
        }
        for pattern in &self.note_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| ConfigError::Invalid(format!("note pattern '{}': {}", pattern, e)))?;
        }

        if matches!(&self.list_command, Some(argv) if argv.is_empty()) {
            return Err(ConfigError::Invalid("list_command must not be empty".to_string()));
        }
        if self.default_limit == Some(0) {
            return Err(ConfigError::Invalid("default_limit must be positive".to_string()));
        }
        Ok(())
    }
}
