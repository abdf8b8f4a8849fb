//! Configuration loading, validation, and management for Wayfarer.
//!
//! Loads configuration from `~/.wayfarer/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.wayfarer/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model, used when a stage has no model of its own
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Generation cycle settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Knowledge store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Skill document settings
    #[serde(default)]
    pub skills: SkillsConfig,

    /// Provider-specific configurations, tried in fallback order by name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Order in which extra providers are appended to the fallback chain
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_order: Vec<String>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("generation", &self.generation)
            .field("storage", &self.storage)
            .field("skills", &self.skills)
            .field("providers", &self.providers)
            .field("fallback_order", &self.fallback_order)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Connection strings routinely embed credentials.
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("url", &redact(&self.url))
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model for title / region ideation (falls back to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_model: Option<String>,

    /// Model for full notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_model: Option<String>,

    /// Model for script analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_model: Option<String>,

    #[serde(default = "default_title_temperature")]
    pub title_temperature: f32,

    #[serde(default = "default_note_temperature")]
    pub note_temperature: f32,

    #[serde(default = "default_learn_temperature")]
    pub learn_temperature: f32,

    /// Extra attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// How many ranked titles must validate
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_title_batch_size")]
    pub title_batch_size: usize,

    #[serde(default = "default_region_batch_size")]
    pub region_batch_size: usize,

    #[serde(default = "default_max_notes_per_day")]
    pub max_notes_per_day: u32,

    #[serde(default = "default_note_max_tokens")]
    pub note_max_tokens: u32,

    /// Offset from UTC used for day keys and content ids
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Keywords that zero a candidate's score outright
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_regions: Vec<String>,
}

fn default_title_temperature() -> f32 {
    0.9
}
fn default_note_temperature() -> f32 {
    0.8
}
fn default_learn_temperature() -> f32 {
    0.1
}
fn default_max_retries() -> usize {
    3
}
fn default_top_k() -> usize {
    2
}
fn default_title_batch_size() -> usize {
    6
}
fn default_region_batch_size() -> usize {
    5
}
fn default_max_notes_per_day() -> u32 {
    2
}
fn default_note_max_tokens() -> u32 {
    900
}
fn default_utc_offset_hours() -> i32 {
    8
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            title_model: None,
            note_model: None,
            learn_model: None,
            title_temperature: default_title_temperature(),
            note_temperature: default_note_temperature(),
            learn_temperature: default_learn_temperature(),
            max_retries: default_max_retries(),
            top_k: default_top_k(),
            title_batch_size: default_title_batch_size(),
            region_batch_size: default_region_batch_size(),
            max_notes_per_day: default_max_notes_per_day(),
            note_max_tokens: default_note_max_tokens(),
            utc_offset_hours: default_utc_offset_hours(),
            excluded_regions: vec![],
        }
    }
}

/// Which knowledge store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON snapshot + JSONL logs under `data_dir`
    #[default]
    File,
    /// SQLite database at `url`
    Sqlite,
    /// No persistence; every write reports unavailable
    None,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Connection string (SQLite backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Directory for file-backed state (defaults to `~/.wayfarer/data`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            url: None,
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Directory of skill markdown files (defaults to `~/.wayfarer/skills`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Character budget for all injected skill documents
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,

    /// How many recent wins feed the summary
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
}

fn default_budget_chars() -> usize {
    6000
}
fn default_summary_window() -> usize {
    20
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            budget_chars: default_budget_chars(),
            summary_window: default_summary_window(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Per-call timeout inside the fallback chain
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    /// Load configuration from the default path (~/.wayfarer/config.toml).
    ///
    /// Environment variables override the file:
    /// - `WAYFARER_API_KEY`, then `OPENAI_API_KEY`
    /// - `WAYFARER_PROVIDER`, `WAYFARER_MODEL`
    /// - `WAYFARER_DB_URL` (switches storage to SQLite)
    /// - `WAYFARER_SKILLS_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("WAYFARER_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(provider) = non_empty("WAYFARER_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = non_empty("WAYFARER_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = non_empty("WAYFARER_DB_URL") {
            self.storage.backend = StorageBackend::Sqlite;
            self.storage.url = Some(url);
        }
        if let Some(dir) = non_empty("WAYFARER_SKILLS_DIR") {
            self.skills.dir = Some(PathBuf::from(dir));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wayfarer")
    }

    /// Directory for file-backed knowledge state.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("data"))
    }

    /// Directory of skill markdown files.
    pub fn skills_dir(&self) -> PathBuf {
        self.skills
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("skills"))
    }

    pub fn title_model(&self) -> &str {
        self.generation.title_model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn note_model(&self) -> &str {
        self.generation.note_model.as_deref().unwrap_or(&self.default_model)
    }

    pub fn learn_model(&self) -> &str {
        self.generation.learn_model.as_deref().unwrap_or(&self.default_model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        for (name, value) in [
            ("title_temperature", g.title_temperature),
            ("note_temperature", g.note_temperature),
            ("learn_temperature", g.learn_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "generation.{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if g.title_batch_size == 0 || g.region_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch sizes must be greater than 0".into(),
            ));
        }

        if g.top_k == 0 || g.top_k > g.title_batch_size {
            return Err(ConfigError::ValidationError(format!(
                "generation.top_k must be between 1 and title_batch_size ({})",
                g.title_batch_size
            )));
        }

        if self.skills.budget_chars == 0 {
            return Err(ConfigError::ValidationError(
                "skills.budget_chars must be > 0".into(),
            ));
        }

        if self.storage.backend == StorageBackend::Sqlite && self.storage.url.is_none() {
            tracing::warn!("SQLite storage selected without a url; knowledge store will be unavailable");
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            generation: GenerationConfig::default(),
            storage: StorageConfig::default(),
            skills: SkillsConfig::default(),
            providers: HashMap::new(),
            fallback_order: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.generation.top_k, 2);
        assert_eq!(config.generation.max_notes_per_day, 2);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.skills.budget_chars, config.skills.budget_chars);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.title_temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn top_k_larger_than_batch_rejected() {
        let mut config = AppConfig::default();
        config.generation.top_k = 7;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"
default_model = "gpt-4o"

[generation]
max_retries = 5
note_model = "gpt-4o-mini"

[storage]
backend = "sqlite"
url = "sqlite://knowledge.db"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.generation.max_retries, 5);
        assert_eq!(config.generation.top_k, 2);
        assert_eq!(config.title_model(), "gpt-4o");
        assert_eq!(config.note_model(), "gpt-4o-mini");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-fallback"),
            ("WAYFARER_API_KEY", "sk-primary"),
            ("WAYFARER_DB_URL", "sqlite:///tmp/k.db"),
            ("WAYFARER_MODEL", ""),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-primary"));
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        // Empty values are ignored
        assert_eq!(config.default_model, "gpt-4o-mini");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.storage.url = Some("postgres://user:pw@host/db".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("pw@host"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("max_retries"));
    }
}
