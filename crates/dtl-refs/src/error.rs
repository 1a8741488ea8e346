//! Error types for tag classification and tag store operations.

use dtl_types::{CommitId, TagKind, TypeError};
use serde::Serialize;
use thiserror::Error;

/// One grammar alternative the validator tried, and why it did not match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GrammarAttempt {
    pub alternative: TagKind,
    pub reason: String,
}

/// A tag name that does not classify (the ledger's `InvalidFormat`).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The name is not a legal git ref name, so no grammar was attempted.
    #[error("invalid tag name '{name}': not a legal ref name: {reason}")]
    RefSyntax { name: String, reason: String },

    /// Every grammar alternative was attempted and rejected.
    #[error("invalid tag name '{}': {}", .name, render_attempts(.attempts))]
    NoAlternativeMatched {
        name: String,
        attempts: Vec<GrammarAttempt>,
    },

    /// The name classified, but not as the kind the caller asked for.
    #[error("tag '{name}' is a {found} tag, expected a {expected} tag")]
    WrongKind {
        name: String,
        expected: TagKind,
        found: TagKind,
    },
}

impl ClassifyError {
    /// The offending name.
    pub fn name(&self) -> &str {
        match self {
            ClassifyError::RefSyntax { name, .. }
            | ClassifyError::NoAlternativeMatched { name, .. }
            | ClassifyError::WrongKind { name, .. } => name,
        }
    }
}

fn render_attempts(attempts: &[GrammarAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("not {} ({})", a.alternative, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_found(found: &Option<CommitId>) -> String {
    match found {
        Some(commit) => format!("it points at {commit}"),
        None => "it does not exist".to_string(),
    }
}

/// Errors that can occur during tag store operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The tag name is malformed.
    #[error(transparent)]
    InvalidFormat(#[from] ClassifyError),

    /// An immutable tag already exists at a different commit.
    #[error("tag '{name}' already exists at {existing}; refusing to bind it to {requested}")]
    CreateConflict {
        name: String,
        existing: CommitId,
        requested: CommitId,
    },

    /// The tag was not found.
    #[error("tag not found: {name}")]
    NotFound { name: String },

    /// A move was attempted on a version or state tag.
    #[error("{kind} tag '{name}' is immutable and cannot be moved")]
    ImmutableTag { name: String, kind: TagKind },

    /// A state tag without a version tag on the same commit.
    #[error(
        "state tag '{}' requires version tag '{}' at {}, but {}",
        .name, .version_tag, .commit, describe_found(.found)
    )]
    UnmatchedStateTag {
        name: String,
        version_tag: String,
        commit: CommitId,
        found: Option<CommitId>,
    },

    /// Deleting a tag without an administrative override.
    #[error("deleting tag '{name}' requires an administrative override (actor and reason)")]
    OverrideRequired { name: String },

    /// Optimistic compare-and-swap kept losing to concurrent writers.
    #[error("tag '{name}' changed concurrently during {attempts} attempts; retry the operation")]
    ConcurrentUpdate { name: String, attempts: usize },

    /// The remote refused a pushed tag.
    #[error("remote '{remote}' rejected tag '{name}': {reason}")]
    PushRejected {
        remote: String,
        name: String,
        reason: String,
    },

    /// A `git` invocation failed.
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// A value read back from the backend is not valid.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error while spawning or talking to a backend process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for tag store operations.
pub type Result<T> = std::result::Result<T, RefError>;
