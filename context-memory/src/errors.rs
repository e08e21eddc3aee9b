//! Error taxonomy for the context memory subsystem.
//!
//! Three families, kept apart so callers can tell a failed conversational
//! turn from a failed save:
//!
//! | Type               | Raised by                          | Recoverable here |
//! |--------------------|------------------------------------|------------------|
//! | `CapabilityError`  | generation / embedding backends    | no, propagated   |
//! | `PersistenceError` | snapshot save / load               | load: yes, save: no |
//! | `MemoryError`      | `ConversationHistory` operations   | depends on source |

use std::path::PathBuf;

use thiserror::Error;

/// Failure of an external generation or embedding capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// Text generation request failed.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Embedding request failed.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Backend rejected the request because of rate limiting.
    #[error("Rate limit: {0}")]
    RateLimit(String),

    /// Backend answered but the payload was unusable.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Network or connection level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend refused the request itself (bad model name, auth, payload).
    /// Retrying the same request will not help.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl CapabilityError {
    /// Whether the caller may retry the same request.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit(_) | Self::Transport(_) | Self::Generation(_) | Self::Embedding(_)
        )
    }
}

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Containing directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a file from disk.
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file to disk.
    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Snapshot could not be encoded.
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(String),

    /// Snapshot could not be decoded.
    #[error("Failed to deserialize snapshot: {0}")]
    Deserialize(String),

    /// Snapshot was written by a newer schema.
    #[error("Snapshot version mismatch: supported up to {supported}, found {found}")]
    VersionMismatch { supported: u32, found: u32 },
}

/// Errors surfaced by `ConversationHistory`.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Compaction call failed. The evicted turns are already gone.
    #[error("Compaction failed after evicting {evicted} turns: {source}")]
    Compaction {
        evicted: usize,
        #[source]
        source: CapabilityError,
    },

    /// Embedding the live conversation for example retrieval failed.
    #[error("Example retrieval failed: {0}")]
    Retrieval(#[source] CapabilityError),

    /// Saving state failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MemoryError {
    /// `true` for failures of a conversational turn (capability errors),
    /// `false` for persistence and configuration failures.
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::Compaction { .. } | Self::Retrieval(_))
    }

    /// The underlying capability error, if any.
    pub fn capability(&self) -> Option<&CapabilityError> {
        match self {
            Self::Compaction { source, .. } => Some(source),
            Self::Retrieval(source) => Some(source),
            Self::Persistence(_) | Self::Configuration(_) => None,
        }
    }
}

/// Result alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result alias for history operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
