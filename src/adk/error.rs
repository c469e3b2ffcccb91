// SPDX-License-Identifier: MIT

//! Typed error handling for taskweave-rs
//!
//! Tool-reported failures are data (recorded on nodes), not errors. The types
//! here cover construction mistakes, misuse of the resume protocol, storage
//! and collaborator faults.

use thiserror::Error;

/// Top-level error type for taskweave-rs
#[derive(Debug, Error)]
pub enum WeaveError {
    /// API errors from external services (model providers, tool backends)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool not found during invocation
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graph construction and resume protocol errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Dependency graph errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Two descriptors share an index
    #[error("Duplicate node index: {0}")]
    DuplicateIndex(usize),

    /// A node depends on an index that does not exist
    #[error("Node {node} depends on unknown node {depends_on}")]
    UnknownDependency { node: usize, depends_on: usize },

    /// Dependency marker that is neither an index nor "none"
    #[error("Node {node} has an unreadable dependency: {value}")]
    InvalidDependency { node: usize, value: String },

    /// A node depends on itself
    #[error("Node {0} depends on itself")]
    SelfDependency(usize),

    /// Tool-bound nodes that can never be scheduled
    #[error("Circular dependency detected: {0:?}")]
    CircularDependency(Vec<usize>),

    /// Node index not present in the graph
    #[error("Unknown node: {0}")]
    UnknownNode(usize),

    /// Status change not allowed by the node state machine
    #[error("Node {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: usize,
        from: String,
        to: String,
    },

    /// Resume called without a node awaiting attention
    #[error("Cannot resume: the previous execution did not pause on a node")]
    NoPausedNode,

    /// Paused level recorded in a result does not exist in the graph
    #[error("Paused level {0} is out of range")]
    UnknownLevel(usize),
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// No snapshot stored under this run id
    #[error("No data found for run_id: {0}")]
    NotFound(String),

    /// Snapshot exists but cannot be decoded
    #[error("Snapshot for run_id {run_id} is corrupt: {reason}")]
    Corrupt { run_id: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured: {0} is not set")]
    ApiKeyMissing(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Every retry attempt failed
    #[error("Giving up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl WeaveError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Short machine-friendly name of the variant, used in execution error info
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::Config(_) => "config",
            Self::Graph(_) => "graph",
            Self::Storage(_) => "storage",
            Self::Model(_) => "model",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
            Self::Http(_) => "http",
            Self::Other(_) => "other",
        }
    }
}

impl From<&str> for WeaveError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for WeaveError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for WeaveError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, WeaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_converts() {
        let err: WeaveError = GraphError::NoPausedNode.into();
        assert_eq!(err.kind(), "graph");
        assert!(err.to_string().contains("did not pause"));
    }

    #[test]
    fn test_not_found_is_distinct_from_corrupt() {
        let missing = StorageError::NotFound("abc".to_string());
        let corrupt = StorageError::Corrupt {
            run_id: "abc".to_string(),
            reason: "eof".to_string(),
        };
        assert!(matches!(missing, StorageError::NotFound(_)));
        assert!(matches!(corrupt, StorageError::Corrupt { .. }));
        assert_ne!(missing.to_string(), corrupt.to_string());
    }
}
