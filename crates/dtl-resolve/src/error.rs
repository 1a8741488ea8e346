use dtl_refs::{ClassifyError, RefError};
use dtl_types::{CommitId, TypeError};
use thiserror::Error;

use crate::trace::ResolutionTrace;

/// Errors raised while resolving versions or reading deployment state.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No non-deprecated version other than the current one exists.
    #[error(
        "no rollback target for '{}': {} candidate(s) considered, none eligible",
        .trace.environment_tag,
        .trace.candidates.len()
    )]
    NoRollbackTarget { trace: Box<ResolutionTrace> },

    /// More than one version tag sits on the deployed commit.
    #[error("environment '{environment_tag}' is at {commit}, which carries several version tags: {}", .tags.join(", "))]
    AmbiguousState {
        environment_tag: String,
        commit: CommitId,
        tags: Vec<String>,
    },

    /// A version string is not `major.minor.patch[-prerelease]`.
    #[error(transparent)]
    InvalidVersion(#[from] TypeError),

    /// A tag name built from the inputs is not in the grammar.
    #[error(transparent)]
    InvalidFormat(#[from] ClassifyError),

    /// The tag store failed.
    #[error(transparent)]
    Refs(#[from] RefError),
}

/// Convenience type alias for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
