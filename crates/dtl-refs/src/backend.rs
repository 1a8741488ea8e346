//! The storage and replication interfaces behind [`TagStore`](crate::TagStore).
//!
//! A backend exposes only atomic primitives. Higher layers never read a value
//! and then blindly write another: every write states what it expects to
//! replace, and the backend refuses the write if that expectation no longer
//! holds.

use std::sync::Arc;

use dtl_types::CommitId;
use serde::Serialize;

use crate::error::Result;

/// Result of an atomic create-if-absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The tag did not exist and now points at the requested commit.
    Created,
    /// The tag already existed; nothing was written.
    Exists(CommitId),
}

/// Result of an atomic compare-and-swap or compare-and-delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expectation held and the write was applied.
    Swapped,
    /// The tag no longer matched the expectation; nothing was written.
    Mismatch { actual: Option<CommitId> },
}

/// Storage backend for the tag namespace.
///
/// Names are short tag names (`api/v1.0.0`), without the `refs/tags/`
/// prefix. Implementations must be thread-safe and each primitive must be
/// atomic with respect to every other primitive on the same name.
pub trait RefBackend: Send + Sync {
    /// Commit a tag currently references (peeled through annotated tags).
    ///
    /// Returns `Ok(None)` if the tag does not exist.
    fn read(&self, name: &str) -> Result<Option<CommitId>>;

    /// Create `name` at `commit` only if no tag with that name exists.
    ///
    /// When `message` is given the backend may record it (annotated tag).
    fn create_if_absent(
        &self,
        name: &str,
        commit: &CommitId,
        message: Option<&str>,
    ) -> Result<CreateOutcome>;

    /// Replace the tag's target with `new` if it currently references
    /// `expected` (`None` = the tag must not exist).
    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<&CommitId>,
        new: &CommitId,
    ) -> Result<CasOutcome>;

    /// Delete the tag if it currently references `expected`.
    fn compare_and_delete(&self, name: &str, expected: &CommitId) -> Result<CasOutcome>;

    /// All tags whose name starts with `prefix`, sorted by name.
    ///
    /// Pass `""` to list the whole namespace.
    fn list(&self, prefix: &str) -> Result<Vec<(String, CommitId)>>;
}

impl<T: RefBackend + ?Sized> RefBackend for Arc<T> {
    fn read(&self, name: &str) -> Result<Option<CommitId>> {
        (**self).read(name)
    }

    fn create_if_absent(
        &self,
        name: &str,
        commit: &CommitId,
        message: Option<&str>,
    ) -> Result<CreateOutcome> {
        (**self).create_if_absent(name, commit, message)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<&CommitId>,
        new: &CommitId,
    ) -> Result<CasOutcome> {
        (**self).compare_and_swap(name, expected, new)
    }

    fn compare_and_delete(&self, name: &str, expected: &CommitId) -> Result<CasOutcome> {
        (**self).compare_and_delete(name, expected)
    }

    fn list(&self, prefix: &str) -> Result<Vec<(String, CommitId)>> {
        (**self).list(prefix)
    }
}

/// A replica the local namespace is propagated to (a git remote).
///
/// Publishing is last-writer-wins at the replica; the ledger does not lock.
pub trait RemoteMirror: Send + Sync {
    /// Name used in logs and errors (e.g. `origin`).
    fn remote_name(&self) -> &str;

    /// Push the local value of `name` to the replica. `force` replaces an
    /// existing remote value (environment tags only). A refused push is
    /// [`RefError::PushRejected`](crate::RefError::PushRejected).
    fn publish(&self, name: &str, force: bool) -> Result<()>;

    /// Commit the replica currently holds for `name`.
    fn remote_points_at(&self, name: &str) -> Result<Option<CommitId>>;
}

/// A published tag whose remote value differs from what was pushed.
///
/// Expected under concurrent pipelines: another writer won the race at the
/// replica. Logged, never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PushRaceDrift {
    pub remote: String,
    pub name: String,
    pub intended: CommitId,
    pub observed: Option<CommitId>,
}

/// Outcome of [`TagStore::publish`](crate::TagStore::publish).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    /// No remote is configured; the write is local only.
    LocalOnly,
    /// The remote holds the intended commit.
    Confirmed { remote: String },
    /// The remote holds something else after the push.
    Drifted(PushRaceDrift),
}

impl PushOutcome {
    pub fn drift(&self) -> Option<&PushRaceDrift> {
        match self {
            PushOutcome::Drifted(drift) => Some(drift),
            PushOutcome::LocalOnly | PushOutcome::Confirmed { .. } => None,
        }
    }
}
