//! [`TagStore`]: the create/move/delete/query contracts over a [`RefBackend`].
//!
//! All higher components reach the tag namespace through this type. It turns
//! the backend's atomic primitives into the ledger's rules:
//!
//! - version and state tags are created once and never rebound
//! - state tags must sit on the commit of their version tag
//! - environment tags are replaced atomically, never deleted-then-created
//! - deletes require an administrative override and are audited

use std::fmt;

use dtl_types::{CommitId, Subproject, TagKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{CasOutcome, CreateOutcome, PushOutcome, PushRaceDrift, RefBackend, RemoteMirror};
use crate::classify::TagValidator;
use crate::error::{ClassifyError, RefError, Result};
use crate::names::{Tag, TagName};

/// Attempts of the optimistic read-compare-swap loop before giving up.
pub const MAX_CAS_ATTEMPTS: usize = 3;

/// Result of [`TagStore::create`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateReceipt {
    /// The tag was written.
    Created,
    /// The tag already pointed at the requested commit; nothing was written.
    AlreadyPresent,
}

/// Result of [`TagStore::move_tag`], for audit logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveReceipt {
    pub name: String,
    /// Commit the tag referenced before the move (`None` on first deploy).
    pub previous: Option<CommitId>,
    pub current: CommitId,
    /// Compare-and-swap attempts used.
    pub attempts: usize,
}

impl MoveReceipt {
    /// `true` when the tag already pointed at the target.
    pub fn is_noop(&self) -> bool {
        self.previous.as_ref() == Some(&self.current)
    }
}

/// Explicit administrative override required to delete a tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminOverride {
    pub actor: String,
    pub reason: String,
}

impl AdminOverride {
    pub fn new(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            reason: reason.into(),
        }
    }

    /// An override is only honoured with both an actor and a reason.
    pub fn is_valid(&self) -> bool {
        !self.actor.trim().is_empty() && !self.reason.trim().is_empty()
    }
}

/// Which subprojects a [`TagQuery`] covers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubprojectScope {
    /// Every tag in the namespace.
    #[default]
    Any,
    /// Only tags of the root project.
    Root,
    /// Only tags of exactly this subproject (not nested ones).
    Exact(Subproject),
}

impl SubprojectScope {
    pub fn of(subproject: Option<&Subproject>) -> Self {
        match subproject {
            Some(sub) => SubprojectScope::Exact(sub.clone()),
            None => SubprojectScope::Root,
        }
    }

    fn matches(&self, subproject: Option<&Subproject>) -> bool {
        match self {
            SubprojectScope::Any => true,
            SubprojectScope::Root => subproject.is_none(),
            SubprojectScope::Exact(want) => subproject == Some(want),
        }
    }

    fn backend_prefix(&self) -> String {
        match self {
            SubprojectScope::Exact(sub) => format!("{sub}/"),
            SubprojectScope::Any | SubprojectScope::Root => String::new(),
        }
    }
}

/// Filter for [`TagStore::query`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagQuery {
    pub scope: SubprojectScope,
    pub kind: Option<TagKind>,
    /// Raw name prefix applied before classification.
    pub name_prefix: Option<String>,
}

impl TagQuery {
    /// Every classifiable tag.
    pub fn all() -> Self {
        Self::default()
    }

    /// Tags of one subproject (`None` = root project).
    pub fn in_subproject(subproject: Option<&Subproject>) -> Self {
        Self {
            scope: SubprojectScope::of(subproject),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: TagKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    fn matches(&self, name: &TagName) -> bool {
        self.scope.matches(name.subproject()) && self.kind.map_or(true, |k| name.kind() == k)
    }
}

/// Snapshot result of a query.
///
/// The set is materialised when the query runs, so it can be iterated any
/// number of times with the same result and never touches the backend again.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags referencing `commit`.
    pub fn at_commit<'a>(&'a self, commit: &'a CommitId) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |t| &t.commit == commit)
    }

    /// Look up a tag by its typed name.
    pub fn get(&self, name: &TagName) -> Option<&Tag> {
        self.tags.iter().find(|t| &t.name == name)
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// The ledger's view of the shared tag namespace.
pub struct TagStore<B: RefBackend> {
    backend: B,
    validator: TagValidator,
    remote: Option<Box<dyn RemoteMirror>>,
}

impl<B: RefBackend> fmt::Debug for TagStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagStore")
            .field("validator", &self.validator)
            .field("remote", &self.remote.as_ref().map(|r| r.remote_name()))
            .finish_non_exhaustive()
    }
}

impl<B: RefBackend> TagStore<B> {
    pub fn new(backend: B, validator: TagValidator) -> Self {
        Self {
            backend,
            validator,
            remote: None,
        }
    }

    /// Propagate writes to `remote` through [`Self::publish`].
    pub fn with_remote(mut self, remote: Box<dyn RemoteMirror>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn validator(&self) -> &TagValidator {
        &self.validator
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Classify a raw name with this store's validator.
    pub fn classify(&self, name: &str) -> std::result::Result<TagName, ClassifyError> {
        self.validator.classify(name)
    }

    /// Create `name` at `commit`.
    ///
    /// Idempotent when the tag already points at `commit`; a tag bound
    /// elsewhere is a [`RefError::CreateConflict`]. State tags are rejected
    /// with [`RefError::UnmatchedStateTag`] unless their version tag sits on
    /// the same commit.
    pub fn create(&self, name: &TagName, commit: &CommitId, message: &str) -> Result<CreateReceipt> {
        let message = match name {
            TagName::Version { .. } => Some(message),
            TagName::State { .. } => {
                self.check_state_anchor(name, commit)?;
                Some(message)
            }
            TagName::Environment { .. } => None,
        };

        let raw = name.to_string();
        match self.backend.create_if_absent(&raw, commit, message)? {
            CreateOutcome::Created => {
                info!(tag = %raw, kind = %name.kind(), commit = %commit, "tag created");
                Ok(CreateReceipt::Created)
            }
            CreateOutcome::Exists(existing) if &existing == commit => {
                debug!(tag = %raw, commit = %commit, "tag already present");
                Ok(CreateReceipt::AlreadyPresent)
            }
            CreateOutcome::Exists(existing) => Err(RefError::CreateConflict {
                name: raw,
                existing,
                requested: commit.clone(),
            }),
        }
    }

    /// Atomically point an environment tag at `new_commit`.
    ///
    /// Runs a bounded read-compare-swap loop; the tag is never absent while
    /// it moves. An absent tag is created (first deployment).
    pub fn move_tag(&self, name: &TagName, new_commit: &CommitId) -> Result<MoveReceipt> {
        match name {
            TagName::Environment { .. } => {}
            TagName::Version { .. } | TagName::State { .. } => {
                return Err(RefError::ImmutableTag {
                    name: name.to_string(),
                    kind: name.kind(),
                })
            }
        }

        let raw = name.to_string();
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let previous = self.backend.read(&raw)?;
            if previous.as_ref() == Some(new_commit) {
                debug!(tag = %raw, commit = %new_commit, "environment tag already in place");
                return Ok(MoveReceipt {
                    name: raw,
                    previous,
                    current: new_commit.clone(),
                    attempts: attempt,
                });
            }
            match self
                .backend
                .compare_and_swap(&raw, previous.as_ref(), new_commit)?
            {
                CasOutcome::Swapped => {
                    info!(
                        tag = %raw,
                        from = previous.as_ref().map(CommitId::as_str).unwrap_or("<none>"),
                        to = %new_commit,
                        "environment tag moved"
                    );
                    return Ok(MoveReceipt {
                        name: raw,
                        previous,
                        current: new_commit.clone(),
                        attempts: attempt,
                    });
                }
                CasOutcome::Mismatch { actual } => {
                    warn!(
                        tag = %raw,
                        attempt,
                        observed = actual.as_ref().map(CommitId::as_str).unwrap_or("<none>"),
                        "environment tag changed underneath move; retrying"
                    );
                }
            }
        }

        Err(RefError::ConcurrentUpdate {
            name: raw,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Delete a tag. Requires a valid [`AdminOverride`]; returns the commit
    /// the tag referenced.
    pub fn delete(&self, name: &TagName, admin: Option<&AdminOverride>) -> Result<CommitId> {
        let raw = name.to_string();
        let Some(admin) = admin.filter(|a| a.is_valid()) else {
            warn!(tag = %raw, "tag delete rejected: no administrative override");
            return Err(RefError::OverrideRequired { name: raw });
        };

        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .backend
                .read(&raw)?
                .ok_or_else(|| RefError::NotFound { name: raw.clone() })?;
            match self.backend.compare_and_delete(&raw, &current)? {
                CasOutcome::Swapped => {
                    warn!(
                        target: "dtl::audit",
                        tag = %raw,
                        kind = %name.kind(),
                        commit = %current,
                        actor = %admin.actor,
                        reason = %admin.reason,
                        "tag deleted under administrative override"
                    );
                    return Ok(current);
                }
                CasOutcome::Mismatch { .. } => continue,
            }
        }

        Err(RefError::ConcurrentUpdate {
            name: raw,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// All classifiable tags matching `query`, sorted by name.
    pub fn query(&self, query: &TagQuery) -> Result<TagSet> {
        let prefix = query
            .name_prefix
            .clone()
            .unwrap_or_else(|| query.scope.backend_prefix());

        let mut tags = Vec::new();
        for (raw, commit) in self.backend.list(&prefix)? {
            let name = match self.validator.classify(&raw) {
                Ok(name) => name,
                Err(err) => {
                    debug!(tag = %raw, error = %err, "skipping tag outside the ledger grammar");
                    continue;
                }
            };
            if query.matches(&name) {
                tags.push(Tag::new(name, commit));
            }
        }
        Ok(TagSet { tags })
    }

    /// Commit the tag references, or [`RefError::NotFound`].
    pub fn points_at(&self, name: &TagName) -> Result<CommitId> {
        self.find(name)?.ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }

    /// Commit the tag references, or `None` if it does not exist.
    pub fn find(&self, name: &TagName) -> Result<Option<CommitId>> {
        self.backend.read(&name.to_string())
    }

    /// Push `name` to the configured remote and verify what the remote holds.
    ///
    /// The remote is re-read whether or not the push was accepted. A rejected
    /// push whose remote value is the intended commit counts as confirmed
    /// (another pipeline published the same release); any other remote value
    /// is returned as [`PushOutcome::Drifted`] and logged, not raised. Only a
    /// remote that cannot be read is an error.
    pub fn publish(&self, name: &TagName) -> Result<PushOutcome> {
        let Some(remote) = self.remote.as_deref() else {
            return Ok(PushOutcome::LocalOnly);
        };
        let raw = name.to_string();
        let intended = self.points_at(name)?;

        match remote.publish(&raw, name.is_mutable()) {
            Ok(()) => {}
            Err(RefError::PushRejected { reason, .. }) => {
                debug!(tag = %raw, remote = remote.remote_name(), %reason, "push rejected; re-reading remote");
            }
            Err(err) => return Err(err),
        }
        let observed = remote.remote_points_at(&raw)?;

        if observed.as_ref() == Some(&intended) {
            info!(tag = %raw, remote = remote.remote_name(), commit = %intended, "tag published");
            return Ok(PushOutcome::Confirmed {
                remote: remote.remote_name().to_string(),
            });
        }

        let drift = PushRaceDrift {
            remote: remote.remote_name().to_string(),
            name: raw,
            intended,
            observed,
        };
        warn!(
            tag = %drift.name,
            remote = %drift.remote,
            intended = %drift.intended,
            observed = drift.observed.as_ref().map(CommitId::as_str).unwrap_or("<none>"),
            "remote tag drifted after push; a concurrent writer won the race"
        );
        Ok(PushOutcome::Drifted(drift))
    }

    fn check_state_anchor(&self, state: &TagName, commit: &CommitId) -> Result<()> {
        let Some(version) = state.anchor_version() else {
            return Ok(());
        };
        let found = self.find(&version)?;
        if found.as_ref() == Some(commit) {
            return Ok(());
        }
        Err(RefError::UnmatchedStateTag {
            name: state.to_string(),
            version_tag: version.to_string(),
            commit: commit.clone(),
            found,
        })
    }
}
