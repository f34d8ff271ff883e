//! Error types for the wslhost system
//!
//! This module defines all error types used throughout the crate.
//!
//! Leaf collaborators report the narrow variants (`Query`, `Resolution`,
//! `Write`, `NotFound`, `Persist`). The [`Reconciler`](crate::Reconciler)
//! wraps anything that aborts a pass in [`Error::Pass`], keeping the leaf
//! error as its source.

use std::fmt;
use thiserror::Error;

/// Result type alias for wslhost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a reconciliation pass, used to label fatal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    /// Enumerating environments from the environment source
    ListEnvironments,
    /// Reading the managed entry snapshot from the mapping store
    ReadEntries,
    /// Per-environment reconciliation
    ReconcileEnvironments,
    /// Final commit of the mapping store
    Commit,
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            PassStage::ListEnvironments => "listing environments",
            PassStage::ReadEntries => "reading managed entries",
            PassStage::ReconcileEnvironments => "reconciling environments",
            PassStage::Commit => "committing mapping store",
        };
        f.write_str(stage)
    }
}

/// Core error type for the wslhost system
#[derive(Error, Debug)]
pub enum Error {
    /// Enumeration of environments, the default environment or aliases failed
    #[error("Query error: {0}")]
    Query(String),

    /// An environment's address could not be resolved
    #[error("Failed to resolve address of {environment:?}: {message}")]
    Resolution {
        /// Environment name
        environment: String,
        /// Error message
        message: String,
    },

    /// A single-entry mutation failed
    #[error("Write error: {0}")]
    Write(String),

    /// Entry not found in the mapping store
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// The mapping store could not be persisted
    #[error("Persist error: {0}")]
    Persist(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A reconciliation pass was aborted
    #[error("Reconciliation failed while {stage}")]
    Pass {
        /// Stage that failed
        stage: PassStage,
        /// Underlying leaf error
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(environment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            environment: environment.into(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a persist error
    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error as the cause of an aborted pass
    pub fn pass(stage: PassStage, source: Error) -> Self {
        Self::Pass {
            stage,
            source: Box::new(source),
        }
    }

    /// Stage that aborted the pass, if this is a pass error
    pub fn stage(&self) -> Option<PassStage> {
        match self {
            Self::Pass { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Render the error followed by its sources, separated by `: `
    pub fn display_chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
