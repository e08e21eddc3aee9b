//! Memory configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Builder overrides (`with_save_path`, `with_examples_path`), which the
//!    agent binary drives from its command-line flags
//! 2. Environment variables (`MEMORY_MAX_MESSAGES`, `MEMORY_FEWSHOT`,
//!    `MEMORY_SAVE_PATH`, `MEMORY_EXAMPLES_PATH`)
//! 3. Values from a TOML file
//! 4. Built-in defaults

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::compactor::DEFAULT_MAX_MESSAGES;
use super::retriever::DEFAULT_FEWSHOT;

const ENV_MAX_MESSAGES: &str = "MEMORY_MAX_MESSAGES";
const ENV_FEWSHOT: &str = "MEMORY_FEWSHOT";
const ENV_SAVE_PATH: &str = "MEMORY_SAVE_PATH";
const ENV_EXAMPLES_PATH: &str = "MEMORY_EXAMPLES_PATH";

/// Directory under which per-agent state files live by default.
pub const DEFAULT_STATE_DIR: &str = "bots";

/// Tuning and file locations for one conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Buffer length that triggers compaction.
    pub max_messages: usize,
    /// Number of few-shot examples selected per user turn.
    pub fewshot: usize,
    /// Where state is saved. `None` disables persistence.
    pub save_path: Option<PathBuf>,
    /// Example corpus file. `None` means no examples.
    pub examples_path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            fewshot: DEFAULT_FEWSHOT,
            save_path: None,
            examples_path: None,
        }
    }
}

impl MemoryConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse from TOML; missing keys take defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("invalid memory config: {e}"))
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn from_toml_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Ok(Self::from_toml_str(&content)?.with_env_overrides())
    }

    /// Apply any `MEMORY_*` environment variables on top of `self`.
    ///
    /// Unparsable numeric values are ignored. An empty path variable
    /// disables that path.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides), reading
    /// variables through `lookup`.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = lookup(ENV_MAX_MESSAGES).and_then(|v| v.parse().ok()) {
            self.max_messages = n;
        }
        if let Some(n) = lookup(ENV_FEWSHOT).and_then(|v| v.parse().ok()) {
            self.fewshot = n;
        }
        if let Some(path) = lookup(ENV_SAVE_PATH) {
            self.save_path = non_empty_path(path);
        }
        if let Some(path) = lookup(ENV_EXAMPLES_PATH) {
            self.examples_path = non_empty_path(path);
        }
        self
    }

    /// Builder-style save path override.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = non_empty_path(path.into());
        self
    }

    /// Builder-style examples path override.
    pub fn with_examples_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.examples_path = non_empty_path(path.into());
        self
    }

    /// Validate the config; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_messages == 0 {
            return Err("max_messages must be > 0".to_string());
        }
        Ok(())
    }
}

/// Conventional state file location for an agent: `{base}/bots/{name}/history.json`.
pub fn save_path_for(base: &Path, name: &str) -> PathBuf {
    base.join(DEFAULT_STATE_DIR).join(name).join("history.json")
}

fn non_empty_path(path: impl Into<PathBuf>) -> Option<PathBuf> {
    let path = path.into();
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let cfg = MemoryConfig::default();
        cfg.validate().expect("default config should be valid");
        assert_eq!(cfg.max_messages, 20);
        assert_eq!(cfg.fewshot, 5);
        assert!(cfg.save_path.is_none());
    }

    #[test]
    fn zero_max_messages_rejected() {
        let cfg = MemoryConfig {
            max_messages: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_partial_uses_defaults() {
        let cfg = MemoryConfig::from_toml_str(
            r#"
            fewshot = 2
            save_path = "bots/andy/history.json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.fewshot, 2);
        assert_eq!(cfg.max_messages, 20);
        assert_eq!(
            cfg.save_path,
            Some(PathBuf::from("bots/andy/history.json"))
        );
    }

    #[test]
    fn toml_bad_type_rejected() {
        assert!(MemoryConfig::from_toml_str("max_messages = \"many\"").is_err());
    }

    #[test]
    fn empty_save_path_disables_persistence() {
        let cfg = MemoryConfig::default().with_save_path("");
        assert!(cfg.save_path.is_none());
        let cfg = MemoryConfig::default().with_save_path("a/b.json");
        assert_eq!(cfg.save_path, Some(PathBuf::from("a/b.json")));
    }

    #[test]
    fn overrides_beat_toml_values() {
        let cfg = MemoryConfig::from_toml_str("fewshot = 2\nmax_messages = 8")
            .unwrap()
            .with_overrides_from(|key| match key {
                "MEMORY_FEWSHOT" => Some("7".to_string()),
                "MEMORY_MAX_MESSAGES" => Some("lots".to_string()),
                "MEMORY_SAVE_PATH" => Some(String::new()),
                _ => None,
            });
        assert_eq!(cfg.fewshot, 7);
        assert_eq!(cfg.max_messages, 8);
        assert!(cfg.save_path.is_none());
    }

    #[test]
    fn save_path_for_agent() {
        assert_eq!(
            save_path_for(Path::new("/srv"), "andy"),
            PathBuf::from("/srv/bots/andy/history.json")
        );
    }
}
