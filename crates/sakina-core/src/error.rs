//! Core error types for sakina-core.
//!
//! Each concern gets its own thiserror enum; [`CoreError`] wraps them for
//! callers that only need to report a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sakina-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Gate settings errors
    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Agent snapshot store errors
    #[error("Agent store error: {0}")]
    AgentStore(#[from] AgentStoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the settings store and the mutation serializer.
#[derive(Error, Debug)]
pub enum GateError {
    /// Persisting the settings document failed. The update that produced it
    /// is rejected; the stored settings are unchanged.
    #[error("Failed to save gate settings to {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The serializer task is no longer running.
    #[error("Gate settings serializer has shut down")]
    SerializerClosed,

    /// A storage task panicked or was cancelled before answering.
    #[error("Gate storage task failed: {0}")]
    TaskFailed(String),
}

impl GateError {
    /// Build a write error for an in-memory or otherwise pathless store.
    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GateError::StorageWrite {
            path: path.into(),
            source,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
}

/// Errors from the agent's key/value snapshot store.
#[derive(Error, Debug)]
pub enum AgentStoreError {
    /// Failed to open the agent database
    #[error("Failed to open agent store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Agent store query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Agent store is locked")]
    Locked,

    /// Directory creation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for AgentStoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    AgentStoreError::Locked
                } else {
                    AgentStoreError::QueryFailed(err.to_string())
                }
            }
            _ => AgentStoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for GateError {
    fn from(err: tokio::task::JoinError) -> Self {
        GateError::TaskFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
