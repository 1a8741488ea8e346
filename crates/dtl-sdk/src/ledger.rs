use std::path::Path;

use dtl_gate::{parse_pre_push, ActorContext, GateVerdict, ProtectionGate};
use dtl_refs::{
    AdminOverride, CreateReceipt, GitCliBackend, PushOutcome, RefBackend, RemoteMirror, TagName,
    TagQuery, TagStore,
};
use dtl_resolve::{
    CurrentDeployment, DeploymentStateTracker, EnvironmentSnapshot, RollbackTarget,
    VersionResolver, VersionViolation,
};
use dtl_types::{CommitId, ConflictScopeKey, Subproject, TagKind, TagState};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::error::{SdkError, SdkResult};

/// Result of [`DeploymentLedger::release`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    pub tag: TagName,
    pub commit: CommitId,
    pub receipt: CreateReceipt,
    /// Other version tags of the same subproject already on `commit`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub colocated_versions: Vec<TagName>,
    pub push: PushOutcome,
}

/// Result of [`DeploymentLedger::mark`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarkReport {
    pub tag: TagName,
    pub version_tag: TagName,
    pub commit: CommitId,
    pub receipt: CreateReceipt,
    pub push: PushOutcome,
}

/// Result of a deployment or applied rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub environment_tag: TagName,
    pub version_tag: TagName,
    pub commit: CommitId,
    /// Commit the environment referenced before (`None` on first deploy).
    pub previous: Option<CommitId>,
    /// Key the scheduler uses to serialize mutations of this environment.
    pub scope_key: ConflictScopeKey,
    pub push: PushOutcome,
}

/// Result of [`DeploymentLedger::rollback`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub target: RollbackTarget,
    /// `None` for a dry run.
    pub applied: Option<DeployReport>,
}

/// Result of [`DeploymentLedger::delete`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub tag: TagName,
    pub commit: CommitId,
    pub actor: String,
    pub reason: String,
}

/// High-level Deployment Tag Ledger API.
///
/// Every mutation made here is the sanctioned automation path: writes go
/// through the [`TagStore`] contracts and are published to the configured
/// remote.
pub struct DeploymentLedger<B: RefBackend> {
    store: TagStore<B>,
    gate: ProtectionGate,
    config: LedgerConfig,
}

impl DeploymentLedger<GitCliBackend> {
    /// Open the git repository at `repo`.
    pub fn open(repo: &Path, config: LedgerConfig) -> SdkResult<Self> {
        let backend = GitCliBackend::open(repo)
            .with_annotated_tags(config.annotate)
            .with_pipeline_marker(config.gate.pipeline_marker.clone());
        let mirror = config
            .remote
            .as_ref()
            .map(|remote| backend.clone().with_remote(remote.clone()));

        let ledger = Self::new(backend, config)?;
        Ok(match mirror {
            Some(mirror) => ledger.with_remote(Box::new(mirror)),
            None => ledger,
        })
    }

    /// Resolve a revision such as `HEAD` in the underlying repository.
    pub fn resolve_revision(&self, revision: &str) -> SdkResult<CommitId> {
        Ok(self.store.backend().resolve_revision(revision)?)
    }
}

impl<B: RefBackend> DeploymentLedger<B> {
    pub fn new(backend: B, config: LedgerConfig) -> SdkResult<Self> {
        let validator = config.validator()?;
        let gate = ProtectionGate::with_default_stages(validator.clone(), config.gate.clone());
        Ok(Self {
            store: TagStore::new(backend, validator),
            gate,
            config,
        })
    }

    /// Publish every write to `remote`.
    pub fn with_remote(mut self, remote: Box<dyn RemoteMirror>) -> Self {
        self.store = self.store.with_remote(remote);
        self
    }

    pub fn store(&self) -> &TagStore<B> {
        &self.store
    }

    pub fn gate(&self) -> &ProtectionGate {
        &self.gate
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ---- Naming ----

    pub fn classify(&self, name: &str) -> SdkResult<TagName> {
        Ok(self.store.classify(name)?)
    }

    pub fn scope_key(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
    ) -> SdkResult<ConflictScopeKey> {
        self.store
            .validator()
            .environment_tag(subproject, environment)?;
        Ok(ConflictScopeKey::new(subproject, environment))
    }

    // ---- Mutations ----

    /// Create the version tag for `version` at `commit`.
    pub fn release(
        &self,
        subproject: Option<&Subproject>,
        version: &str,
        commit: &CommitId,
        message: Option<&str>,
    ) -> SdkResult<ReleaseReport> {
        let tag = self.store.validator().version_tag(subproject, version)?;
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| format!("Release {tag}"));
        let receipt = self.store.create(&tag, commit, &message)?;
        let colocated_versions = self.colocated_versions(subproject, &tag, commit)?;
        if !colocated_versions.is_empty() {
            let others: Vec<String> = colocated_versions.iter().map(|t| t.to_string()).collect();
            warn!(
                version = %tag,
                commit = %commit,
                others = %others.join(", "),
                "commit now carries more than one version tag"
            );
        }
        let push = self.store.publish(&tag)?;
        Ok(ReleaseReport {
            tag,
            commit: commit.clone(),
            receipt,
            colocated_versions,
            push,
        })
    }

    /// Record a quality state for an existing version.
    pub fn mark(
        &self,
        subproject: Option<&Subproject>,
        version: &str,
        state: TagState,
        reason: Option<&str>,
    ) -> SdkResult<MarkReport> {
        let version_tag = self.store.validator().version_tag(subproject, version)?;
        let commit = self.version_commit(&version_tag)?;
        let tag = self
            .store
            .validator()
            .state_tag(subproject, version, state)?;
        let message = match reason {
            Some(reason) => format!("{version_tag} marked {state}: {reason}"),
            None => format!("{version_tag} marked {state}"),
        };
        let receipt = self.store.create(&tag, &commit, &message)?;
        let push = self.store.publish(&tag)?;
        Ok(MarkReport {
            tag,
            version_tag,
            commit,
            receipt,
            push,
        })
    }

    /// Point `environment` at the commit of `version`.
    pub fn deploy(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
        version: &str,
    ) -> SdkResult<DeployReport> {
        let version_tag = self.store.validator().version_tag(subproject, version)?;
        let commit = self.version_commit(&version_tag)?;
        let deprecated = self
            .store
            .validator()
            .state_tag(subproject, version, TagState::Deprecated)?;
        if self.store.find(&deprecated)?.as_ref() == Some(&commit) {
            warn!(version = %version_tag, environment, "deploying a deprecated version");
        }
        self.move_environment(subproject, environment, version_tag, commit)
    }

    /// Resolve the rollback target and, unless `dry_run`, deploy it.
    pub fn rollback(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
        dry_run: bool,
    ) -> SdkResult<RollbackReport> {
        let target = VersionResolver::new(&self.store).resolve_rollback_target(subproject, environment)?;
        if dry_run {
            info!(rollback_to = %target.version_tag, environment, "rollback dry run");
            return Ok(RollbackReport {
                target,
                applied: None,
            });
        }
        let applied = self.move_environment(
            subproject,
            environment,
            target.version_tag.clone(),
            target.commit.clone(),
        )?;
        Ok(RollbackReport {
            target,
            applied: Some(applied),
        })
    }

    /// Administrative delete of any ledger tag.
    pub fn delete(&self, name: &str, admin: &AdminOverride) -> SdkResult<DeleteReport> {
        let tag = self.store.classify(name)?;
        let commit = self.store.delete(&tag, Some(admin))?;
        Ok(DeleteReport {
            tag,
            commit,
            actor: admin.actor.clone(),
            reason: admin.reason.clone(),
        })
    }

    // ---- Queries ----

    pub fn current(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
    ) -> SdkResult<CurrentDeployment> {
        Ok(DeploymentStateTracker::new(&self.store).current_version(subproject, environment)?)
    }

    pub fn status(&self, subproject: Option<&Subproject>) -> SdkResult<Vec<EnvironmentSnapshot>> {
        Ok(DeploymentStateTracker::new(&self.store).snapshot(subproject)?)
    }

    pub fn violations(&self) -> SdkResult<Vec<VersionViolation>> {
        Ok(DeploymentStateTracker::new(&self.store).version_violations()?)
    }

    pub fn resolve_rollback_target(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
    ) -> SdkResult<RollbackTarget> {
        Ok(VersionResolver::new(&self.store).resolve_rollback_target(subproject, environment)?)
    }

    // ---- Protection ----

    /// Run pre-push hook input through the protection gate.
    pub fn evaluate_push(&self, input: &str, actor: &ActorContext) -> SdkResult<Vec<GateVerdict>> {
        let mutations = parse_pre_push(input)?;
        Ok(self.gate.evaluate_all(&mutations, actor)?)
    }

    // ---- Internal helpers ----

    fn colocated_versions(
        &self,
        subproject: Option<&Subproject>,
        tag: &TagName,
        commit: &CommitId,
    ) -> SdkResult<Vec<TagName>> {
        let versions = self
            .store
            .query(&TagQuery::in_subproject(subproject).with_kind(TagKind::Version))?;
        Ok(versions
            .at_commit(commit)
            .filter(|t| &t.name != tag)
            .map(|t| t.name.clone())
            .collect())
    }

    fn version_commit(&self, version_tag: &TagName) -> SdkResult<CommitId> {
        self.store
            .find(version_tag)?
            .ok_or_else(|| SdkError::UnknownVersion(version_tag.to_string()))
    }

    fn move_environment(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
        version_tag: TagName,
        commit: CommitId,
    ) -> SdkResult<DeployReport> {
        let environment_tag = self
            .store
            .validator()
            .environment_tag(subproject, environment)?;
        let scope_key = ConflictScopeKey::new(subproject, environment);
        let receipt = self.store.move_tag(&environment_tag, &commit)?;
        let push = self.store.publish(&environment_tag)?;
        info!(
            environment = %environment_tag,
            version = %version_tag,
            scope = %scope_key,
            "deployment recorded"
        );
        Ok(DeployReport {
            environment_tag,
            version_tag,
            commit,
            previous: receipt.previous,
            scope_key,
            push,
        })
    }
}
