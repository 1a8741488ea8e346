use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid semantic version '{input}': {reason}")]
    InvalidSemver { input: String, reason: String },

    #[error("invalid commit id '{input}': {reason}")]
    InvalidCommitId { input: String, reason: String },

    #[error("invalid subproject '{input}': {reason}")]
    InvalidSubproject { input: String, reason: String },

    #[error("invalid environment name '{name}': {reason}")]
    InvalidEnvironment { name: String, reason: String },

    #[error("unknown tag state '{0}' (expected stable, unstable or deprecated)")]
    InvalidState(String),
}
