//! [`DeploymentStateTracker`]: which version is deployed where.
//!
//! Read-only. A deployment is the version tag co-located with an environment
//! tag's commit.

use std::collections::BTreeMap;

use dtl_refs::{RefBackend, TagName, TagQuery, TagStore};
use dtl_types::{CommitId, ConflictScopeKey, Semver, Subproject, TagKind};
use serde::Serialize;
use tracing::debug;

use crate::error::{ResolveError, Result};

/// What an environment tag currently resolves to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurrentDeployment {
    /// The environment tag does not exist.
    NotDeployed,
    /// Exactly one version tag sits on the deployed commit.
    Version {
        tag: TagName,
        version: Semver,
        commit: CommitId,
    },
    /// The deployed commit carries no version tag.
    Untracked { commit: CommitId },
}

impl CurrentDeployment {
    pub fn version(&self) -> Option<&Semver> {
        match self {
            CurrentDeployment::Version { version, .. } => Some(version),
            CurrentDeployment::NotDeployed | CurrentDeployment::Untracked { .. } => None,
        }
    }

    pub fn commit(&self) -> Option<&CommitId> {
        match self {
            CurrentDeployment::Version { commit, .. } | CurrentDeployment::Untracked { commit } => {
                Some(commit)
            }
            CurrentDeployment::NotDeployed => None,
        }
    }
}

/// One row of [`DeploymentStateTracker::snapshot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvironmentSnapshot {
    pub environment: String,
    pub scope_key: ConflictScopeKey,
    pub deployment: Option<CurrentDeployment>,
    /// Set instead of `deployment` when the commit carries several version
    /// tags.
    pub ambiguous_tags: Vec<String>,
}

/// A commit carrying more than one version tag of the same subproject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VersionViolation {
    pub subproject: Option<Subproject>,
    pub commit: CommitId,
    pub tags: Vec<String>,
}

pub struct DeploymentStateTracker<'a, B: RefBackend> {
    store: &'a TagStore<B>,
}

impl<'a, B: RefBackend> DeploymentStateTracker<'a, B> {
    pub fn new(store: &'a TagStore<B>) -> Self {
        Self { store }
    }

    /// The version deployed to `environment`.
    ///
    /// Fails with [`ResolveError::AmbiguousState`] when the deployed commit
    /// carries several version tags.
    pub fn current_version(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
    ) -> Result<CurrentDeployment> {
        let env_tag = self
            .store
            .validator()
            .environment_tag(subproject, environment)?;
        let Some(commit) = self.store.find(&env_tag)? else {
            return Ok(CurrentDeployment::NotDeployed);
        };

        let versions = self
            .store
            .query(&TagQuery::in_subproject(subproject).with_kind(TagKind::Version))?;
        let mut at_commit: Vec<TagName> = versions
            .at_commit(&commit)
            .map(|t| t.name.clone())
            .collect();

        match at_commit.len() {
            0 => {
                debug!(environment = %env_tag, commit = %commit, "deployed commit has no version tag");
                Ok(CurrentDeployment::Untracked { commit })
            }
            1 => {
                let tag = at_commit.remove(0);
                let version = match tag.semver() {
                    Some(v) => v.clone(),
                    None => return Ok(CurrentDeployment::Untracked { commit }),
                };
                Ok(CurrentDeployment::Version {
                    tag,
                    version,
                    commit,
                })
            }
            _ => Err(ResolveError::AmbiguousState {
                environment_tag: env_tag.to_string(),
                commit,
                tags: at_commit.iter().map(|t| t.to_string()).collect(),
            }),
        }
    }

    /// Current deployment of every allow-listed environment of a subproject.
    pub fn snapshot(&self, subproject: Option<&Subproject>) -> Result<Vec<EnvironmentSnapshot>> {
        let mut rows = Vec::new();
        for environment in self.store.validator().environments() {
            let scope_key = ConflictScopeKey::new(subproject, environment);
            let (deployment, ambiguous_tags) = match self.current_version(subproject, environment) {
                Ok(deployment) => (Some(deployment), Vec::new()),
                Err(ResolveError::AmbiguousState { tags, .. }) => (None, tags),
                Err(err) => return Err(err),
            };
            rows.push(EnvironmentSnapshot {
                environment: environment.to_string(),
                scope_key,
                deployment,
                ambiguous_tags,
            });
        }
        Ok(rows)
    }

    /// Every commit carrying more than one version tag of one subproject.
    pub fn version_violations(&self) -> Result<Vec<VersionViolation>> {
        let versions = self
            .store
            .query(&TagQuery::all().with_kind(TagKind::Version))?;

        let mut groups: BTreeMap<(Option<&Subproject>, &CommitId), Vec<String>> = BTreeMap::new();
        for tag in &versions {
            groups
                .entry((tag.name.subproject(), &tag.commit))
                .or_default()
                .push(tag.name.to_string());
        }

        Ok(groups
            .into_iter()
            .filter(|(_, tags)| tags.len() > 1)
            .map(|((subproject, commit), tags)| VersionViolation {
                subproject: subproject.cloned(),
                commit: commit.clone(),
                tags,
            })
            .collect())
    }
}
