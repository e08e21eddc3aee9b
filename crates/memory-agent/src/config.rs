//! Agent runtime configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Command-line flags (applied by the binary via the `with_*` builders)
//! 2. Environment variables (`AGENT_*`, plus `MEMORY_*` for the nested
//!    memory section)
//! 3. Values from a TOML file
//! 4. Built-in defaults
//!
//! [`MemoryConfig`] follows the same order, so a `[memory]` table is still
//! subject to `MEMORY_*` overrides.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use context_memory::{save_path_for, MemoryConfig, SYSTEM_AUTHOR};
use serde::{Deserialize, Serialize};

const DEFAULT_NAME: &str = "andy";
const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

const ENV_NAME: &str = "AGENT_NAME";
const ENV_BIO: &str = "AGENT_BIO";
const ENV_BASE_URL: &str = "AGENT_BASE_URL";
const ENV_API_KEY: &str = "AGENT_API_KEY";
const ENV_CHAT_MODEL: &str = "AGENT_CHAT_MODEL";
const ENV_EMBEDDING_MODEL: &str = "AGENT_EMBEDDING_MODEL";
const ENV_TEMPERATURE: &str = "AGENT_TEMPERATURE";
const ENV_MAX_TOKENS: &str = "AGENT_MAX_TOKENS";
const ENV_TIMEOUT_SECS: &str = "AGENT_TIMEOUT_SECS";
const ENV_CAPABILITY_DOCS: &str = "AGENT_CAPABILITY_DOCS";
const ENV_SKILL_DOCS: &str = "AGENT_SKILL_DOCS";

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent identity; turns authored under this name are `assistant` turns.
    pub name: String,
    /// Initial bio. A restored snapshot replaces it unless overridden.
    pub bio: Option<String>,
    /// OpenAI-compatible API base, e.g. `http://localhost:8080/v1`.
    pub base_url: String,
    /// Bearer token. Most local servers need none.
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Command reference inserted into the system message.
    pub capability_docs_path: Option<PathBuf>,
    /// Skill reference inserted into the system message.
    pub skill_docs_path: Option<PathBuf>,
    pub memory: MemoryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            bio: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            capability_docs_path: None,
            skill_docs_path: None,
            memory: MemoryConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse from TOML; missing keys take built-in defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("Invalid agent config")
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config =
            Self::from_toml_str(&content).with_context(|| format!("In {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    /// Apply `AGENT_*` and `MEMORY_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides), reading
    /// variables through `lookup`. Unparsable numbers are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(ENV_NAME) {
            self.name = v;
        }
        if let Some(v) = lookup(ENV_BIO) {
            self.bio = Some(v);
        }
        if let Some(v) = lookup(ENV_BASE_URL) {
            self.base_url = v;
        }
        if let Some(v) = lookup(ENV_API_KEY) {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup(ENV_CHAT_MODEL) {
            self.chat_model = v;
        }
        if let Some(v) = lookup(ENV_EMBEDDING_MODEL) {
            self.embedding_model = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TEMPERATURE) {
            self.temperature = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_MAX_TOKENS) {
            self.max_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = v;
        }
        if let Some(v) = lookup(ENV_CAPABILITY_DOCS) {
            self.capability_docs_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_SKILL_DOCS) {
            self.skill_docs_path = Some(PathBuf::from(v));
        }
        self.memory = self.memory.with_overrides_from(&lookup);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory = self.memory.with_save_path(path);
        self
    }

    pub fn with_examples_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory = self.memory.with_examples_path(path);
        self
    }

    /// Fill in `bots/{name}/history.json` under `base` when no save path
    /// is configured.
    pub fn with_default_save_path(mut self, base: &Path) -> Self {
        if self.memory.save_path.is_none() {
            self.memory.save_path = Some(save_path_for(base, &self.name));
        }
        self
    }

    /// Validate the config; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name == SYSTEM_AUTHOR {
            return Err(format!("name must not be the reserved author '{SYSTEM_AUTHOR}'"));
        }
        if self.name.contains(':') {
            return Err("name must not contain ':'".to_string());
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("base_url must be an http(s) URL, got '{}'", self.base_url));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be within [0.0, 2.0], got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be > 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }
        self.memory.validate()
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AgentConfig {
        AgentConfig {
            name: "andy".into(),
            base_url: DEFAULT_BASE_URL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            memory: MemoryConfig::default(),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn base_config_validates() {
        base().validate().expect("base config should be valid");
    }

    #[test]
    fn toml_overrides_fields_and_nested_memory() {
        let cfg = AgentConfig::from_toml_str(
            r#"
            name = "scout"
            base_url = "http://vasp-02:8081/v1"
            temperature = 0.2

            [memory]
            max_messages = 8
            fewshot = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.name, "scout");
        assert_eq!(cfg.base_url, "http://vasp-02:8081/v1");
        assert!((cfg.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(cfg.memory.max_messages, 8);
        assert_eq!(cfg.memory.fewshot, 2);
    }

    #[test]
    fn environment_beats_toml_including_memory_table() {
        let cfg = AgentConfig::from_toml_str(
            r#"
            chat_model = "from-file"
            max_tokens = 256

            [memory]
            fewshot = 2
            max_messages = 8
            "#,
        )
        .unwrap()
        .with_overrides_from(|key| match key {
            "AGENT_CHAT_MODEL" => Some("from-env".to_string()),
            "AGENT_MAX_TOKENS" => Some("not-a-number".to_string()),
            "MEMORY_FEWSHOT" => Some("9".to_string()),
            _ => None,
        });
        assert_eq!(cfg.chat_model, "from-env");
        assert_eq!(cfg.max_tokens, 256);
        assert_eq!(cfg.memory.fewshot, 9);
        assert_eq!(cfg.memory.max_messages, 8);
    }

    #[test]
    fn cli_builders_beat_environment() {
        let cfg = AgentConfig::default()
            .with_overrides_from(|key| match key {
                "AGENT_NAME" => Some("envbot".to_string()),
                "MEMORY_SAVE_PATH" => Some("/env/history.json".to_string()),
                _ => None,
            })
            .with_name("clibot")
            .with_save_path("/cli/history.json");
        assert_eq!(cfg.name, "clibot");
        assert_eq!(cfg.memory.save_path, Some(PathBuf::from("/cli/history.json")));
    }

    #[test]
    fn toml_bad_type_rejected() {
        assert!(AgentConfig::from_toml_str("max_tokens = \"lots\"").is_err());
    }

    #[test]
    fn reserved_or_empty_name_rejected() {
        assert!(base().with_name("").validate().is_err());
        assert!(base().with_name("system").validate().is_err());
        assert!(base().with_name("a:b").validate().is_err());
    }

    #[test]
    fn bad_url_and_ranges_rejected() {
        let mut cfg = base();
        cfg.base_url = "localhost:8080".into();
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.temperature = 3.5;
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.max_tokens = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.memory.max_messages = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_save_path_uses_name() {
        let cfg = base().with_name("scout").with_default_save_path(Path::new("/srv"));
        assert_eq!(
            cfg.memory.save_path,
            Some(PathBuf::from("/srv/bots/scout/history.json"))
        );

        let cfg = base()
            .with_save_path("/tmp/custom.json")
            .with_default_save_path(Path::new("/srv"));
        assert_eq!(cfg.memory.save_path, Some(PathBuf::from("/tmp/custom.json")));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AgentConfig::from_toml_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.toml"));
    }
}
