//! In-memory tag namespace for testing and ephemeral use.
//!
//! [`InMemoryRefBackend`] keeps every tag in a `BTreeMap` behind a single
//! `RwLock`; each primitive runs under one write guard, which makes it atomic
//! with respect to every other primitive. [`InMemoryRemote`] pairs a local
//! backend with a second map standing in for a git remote.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dtl_types::CommitId;

use crate::backend::{CasOutcome, CreateOutcome, RefBackend, RemoteMirror};
use crate::error::{RefError, Result};

#[derive(Clone, Debug)]
struct StoredTag {
    commit: CommitId,
    message: Option<String>,
}

/// An in-memory implementation of [`RefBackend`].
#[derive(Debug, Default)]
pub struct InMemoryRefBackend {
    tags: RwLock<BTreeMap<String, StoredTag>>,
}

impl InMemoryRefBackend {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// The message recorded when the tag was created, if any.
    pub fn message(&self, name: &str) -> Result<Option<String>> {
        Ok(self.read_guard()?.get(name).and_then(|t| t.message.clone()))
    }

    /// Unconditionally bind `name` to `commit`, bypassing every ledger rule.
    ///
    /// Stands in for an out-of-band writer (a human with raw git access, a
    /// concurrent pipeline) in tests.
    pub fn force_set(&self, name: &str, commit: &CommitId) -> Result<()> {
        self.write_guard()?.insert(
            name.to_string(),
            StoredTag {
                commit: commit.clone(),
                message: None,
            },
        );
        Ok(())
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, StoredTag>>> {
        self.tags
            .read()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, StoredTag>>> {
        self.tags
            .write()
            .map_err(|e| RefError::LockPoisoned(e.to_string()))
    }
}

impl RefBackend for InMemoryRefBackend {
    fn read(&self, name: &str) -> Result<Option<CommitId>> {
        Ok(self.read_guard()?.get(name).map(|t| t.commit.clone()))
    }

    fn create_if_absent(
        &self,
        name: &str,
        commit: &CommitId,
        message: Option<&str>,
    ) -> Result<CreateOutcome> {
        let mut tags = self.write_guard()?;
        if let Some(existing) = tags.get(name) {
            return Ok(CreateOutcome::Exists(existing.commit.clone()));
        }
        tags.insert(
            name.to_string(),
            StoredTag {
                commit: commit.clone(),
                message: message.map(str::to_string),
            },
        );
        Ok(CreateOutcome::Created)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<&CommitId>,
        new: &CommitId,
    ) -> Result<CasOutcome> {
        let mut tags = self.write_guard()?;
        let actual = tags.get(name).map(|t| t.commit.clone());
        if actual.as_ref() != expected {
            return Ok(CasOutcome::Mismatch { actual });
        }
        let message = tags.get(name).and_then(|t| t.message.clone());
        tags.insert(
            name.to_string(),
            StoredTag {
                commit: new.clone(),
                message,
            },
        );
        Ok(CasOutcome::Swapped)
    }

    fn compare_and_delete(&self, name: &str, expected: &CommitId) -> Result<CasOutcome> {
        let mut tags = self.write_guard()?;
        let actual = tags.get(name).map(|t| t.commit.clone());
        if actual.as_ref() != Some(expected) {
            return Ok(CasOutcome::Mismatch { actual });
        }
        tags.remove(name);
        Ok(CasOutcome::Swapped)
    }

    fn list(&self, prefix: &str) -> Result<Vec<(String, CommitId)>> {
        let tags = self.read_guard()?;
        Ok(tags
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, tag)| (name.clone(), tag.commit.clone()))
            .collect())
    }
}

/// An in-memory stand-in for a git remote.
///
/// `publish` copies the local value into the remote map with the same
/// fast-forward rules a git server applies to tags: an existing remote tag is
/// only replaced when forced.
#[derive(Debug)]
pub struct InMemoryRemote {
    name: String,
    local: Arc<InMemoryRefBackend>,
    remote: Arc<InMemoryRefBackend>,
}

impl InMemoryRemote {
    pub fn new(
        name: impl Into<String>,
        local: Arc<InMemoryRefBackend>,
        remote: Arc<InMemoryRefBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            local,
            remote,
        }
    }
}

impl RemoteMirror for InMemoryRemote {
    fn remote_name(&self) -> &str {
        &self.name
    }

    fn publish(&self, name: &str, force: bool) -> Result<()> {
        let commit = self.local.read(name)?.ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })?;
        if force {
            return self.remote.force_set(name, &commit);
        }
        match self.remote.create_if_absent(name, &commit, None)? {
            CreateOutcome::Created => Ok(()),
            CreateOutcome::Exists(existing) if existing == commit => Ok(()),
            CreateOutcome::Exists(existing) => Err(RefError::PushRejected {
                remote: self.name.clone(),
                name: name.to_string(),
                reason: format!("already exists at {existing}"),
            }),
        }
    }

    fn remote_points_at(&self, name: &str) -> Result<Option<CommitId>> {
        self.remote.read(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(s: &str) -> CommitId {
        CommitId::new(s).unwrap()
    }

    // ---- Test 1: create then read ----
    #[test]
    fn create_and_read() {
        let backend = InMemoryRefBackend::new();
        let outcome = backend
            .create_if_absent("v1.0.0", &commit("a1"), Some("Release v1.0.0"))
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created);
        assert_eq!(backend.read("v1.0.0").unwrap(), Some(commit("a1")));
        assert_eq!(
            backend.message("v1.0.0").unwrap().as_deref(),
            Some("Release v1.0.0")
        );
    }

    // ---- Test 2: create on an existing name reports the existing commit ----
    #[test]
    fn create_if_absent_never_overwrites() {
        let backend = InMemoryRefBackend::new();
        backend.create_if_absent("v1.0.0", &commit("a1"), None).unwrap();
        let outcome = backend
            .create_if_absent("v1.0.0", &commit("b2"), None)
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Exists(commit("a1")));
        assert_eq!(backend.read("v1.0.0").unwrap(), Some(commit("a1")));
    }

    // ---- Test 3: compare-and-swap applies only on match ----
    #[test]
    fn cas_checks_expectation() {
        let backend = InMemoryRefBackend::new();
        assert_eq!(
            backend.compare_and_swap("staging", None, &commit("c1")).unwrap(),
            CasOutcome::Swapped
        );
        assert_eq!(
            backend
                .compare_and_swap("staging", None, &commit("c2"))
                .unwrap(),
            CasOutcome::Mismatch {
                actual: Some(commit("c1"))
            }
        );
        assert_eq!(
            backend
                .compare_and_swap("staging", Some(&commit("c1")), &commit("c2"))
                .unwrap(),
            CasOutcome::Swapped
        );
        assert_eq!(backend.read("staging").unwrap(), Some(commit("c2")));
    }

    // ---- Test 4: compare-and-delete ----
    #[test]
    fn cas_delete() {
        let backend = InMemoryRefBackend::new();
        backend.force_set("v1.0.0", &commit("a1")).unwrap();
        assert!(matches!(
            backend.compare_and_delete("v1.0.0", &commit("zz")).unwrap(),
            CasOutcome::Mismatch { .. }
        ));
        assert_eq!(
            backend.compare_and_delete("v1.0.0", &commit("a1")).unwrap(),
            CasOutcome::Swapped
        );
        assert_eq!(backend.read("v1.0.0").unwrap(), None);
    }

    // ---- Test 5: list by prefix, sorted ----
    #[test]
    fn list_by_prefix() {
        let backend = InMemoryRefBackend::new();
        for (name, c) in [("api/v1.0.0", "a"), ("web/v1.0.0", "b"), ("api/staging", "c")] {
            backend.force_set(name, &commit(c)).unwrap();
        }
        let names: Vec<_> = backend
            .list("api/")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["api/staging", "api/v1.0.0"]);
        assert_eq!(backend.list("").unwrap().len(), 3);
    }

    // ---- Test 6: remote publish rules ----
    #[test]
    fn remote_rejects_unforced_rebind() {
        let local = Arc::new(InMemoryRefBackend::new());
        let remote = InMemoryRemote::new("origin", local.clone(), Arc::new(InMemoryRefBackend::new()));

        local.force_set("v1.0.0", &commit("a1")).unwrap();
        remote.publish("v1.0.0", false).unwrap();
        assert_eq!(remote.remote_points_at("v1.0.0").unwrap(), Some(commit("a1")));

        local.force_set("v1.0.0", &commit("b2")).unwrap();
        let err = remote.publish("v1.0.0", false).unwrap_err();
        assert!(matches!(err, RefError::PushRejected { .. }));

        remote.publish("v1.0.0", true).unwrap();
        assert_eq!(remote.remote_points_at("v1.0.0").unwrap(), Some(commit("b2")));
    }
}
