//! Agent state persistence: versioned JSON snapshots.
//!
//! The snapshot carries identity, bio, memory and the verbatim turns. Example
//! embeddings and the current selection are derived state and never saved.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{PersistenceError, PersistenceResult};
use super::turn::Turn;

/// Durable agent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Schema version. Files written before versioning decode as `0`.
    #[serde(default)]
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// When the snapshot was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    /// Reserved. Read back if present, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_saved_turns: Option<u64>,
}

impl AgentSnapshot {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(name: &str, bio: &str, memory: &str, turns: Vec<Turn>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            name: name.to_string(),
            bio: bio.to_string(),
            memory: memory.to_string(),
            turns,
            saved_at: None,
            num_saved_turns: None,
        }
    }

    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> PersistenceResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PersistenceError::Serialize(e.to_string()))
    }

    /// Deserialize from JSON, rejecting snapshots from a newer schema.
    pub fn from_json(json: &str) -> PersistenceResult<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| PersistenceError::Deserialize(e.to_string()))?;

        if snapshot.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                supported: Self::CURRENT_VERSION,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

/// Write a snapshot, creating the containing directory if needed.
///
/// Overwrites whatever was at `path`.
pub fn save_snapshot(snapshot: &AgentSnapshot, path: &Path) -> PersistenceResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PersistenceError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut snapshot = snapshot.clone();
    snapshot.version = AgentSnapshot::CURRENT_VERSION;
    snapshot.saved_at = Some(Utc::now());

    let json = snapshot.to_json()?;
    std::fs::write(path, json).map_err(|e| PersistenceError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a snapshot. `Ok(None)` when no file exists at `path`.
pub fn load_snapshot(path: &Path) -> PersistenceResult<Option<AgentSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path).map_err(|e| PersistenceError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    AgentSnapshot::from_json(&json).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AgentSnapshot {
        AgentSnapshot::new(
            "andy",
            "a friendly builder",
            "- I learned that player steve likes oak",
            vec![Turn::user("steve: hi"), Turn::assistant("hey!")],
        )
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("andy.json");
        save_snapshot(&sample(), &path).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.name, "andy");
        assert_eq!(loaded.bio, "a friendly builder");
        assert_eq!(loaded.memory, "- I learned that player steve likes oak");
        assert_eq!(loaded.turns, sample().turns);
        assert_eq!(loaded.version, AgentSnapshot::CURRENT_VERSION);
        assert!(loaded.saved_at.is_some());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bots").join("andy").join("history.json");
        save_snapshot(&sample(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("andy.json");
        save_snapshot(&sample(), &path).unwrap();

        let mut second = sample();
        second.memory = String::new();
        second.turns.clear();
        save_snapshot(&second, &path).unwrap();

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert!(loaded.memory.is_empty());
        assert!(loaded.turns.is_empty());
    }

    #[test]
    fn test_save_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = save_snapshot(&sample(), &blocker.join("andy.json")).unwrap_err();
        assert!(matches!(err, PersistenceError::CreateDir { .. }));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("nope.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Deserialize(_)));
    }

    #[test]
    fn test_legacy_unversioned_file() {
        let json = r#"{
            "name": "andy",
            "bio": "",
            "memory": "old memory",
            "turns": [{"role": "user", "content": "steve: hi"}],
            "num_saved_turns": 12
        }"#;
        let snapshot = AgentSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.memory, "old memory");
        assert_eq!(snapshot.num_saved_turns, Some(12));
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let snapshot = AgentSnapshot::from_json(r#"{"name": "andy"}"#).unwrap();
        assert!(snapshot.bio.is_empty());
        assert!(snapshot.memory.is_empty());
        assert!(snapshot.turns.is_empty());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = AgentSnapshot::from_json(r#"{"version": 99, "name": "andy"}"#).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::VersionMismatch {
                supported: 1,
                found: 99
            }
        ));
    }

    #[test]
    fn test_reserved_field_omitted_when_unset() {
        let json = sample().to_json().unwrap();
        assert!(!json.contains("num_saved_turns"));
        assert!(!json.contains("saved_at"));
    }
}
