//! [`RefBackend`] and [`RemoteMirror`] over the `git` command line.
//!
//! Every write maps onto a single git ref transaction:
//!
//! - create: `git tag -a` (annotated) or `git update-ref <ref> <new> ""`,
//!   both of which fail if the ref already exists
//! - replace: `git update-ref <ref> <new> <old>`
//! - delete: `git update-ref -d <ref> <old>`
//!
//! Ref arguments always follow `--end-of-options` (git 2.24+), so a name can
//! never be parsed as a flag. Reads peel annotated tags to the commit they
//! reference.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use dtl_types::CommitId;
use tracing::debug;

use crate::backend::{CasOutcome, CreateOutcome, RefBackend, RemoteMirror};
use crate::error::{RefError, Result};

/// Environment variable set on pushes issued by the ledger itself, so the
/// pre-push gate can tell pipeline pushes from manual ones.
pub const DEFAULT_PIPELINE_MARKER: &str = "DTL_PIPELINE";

/// A tag as git stores it: the raw object the ref holds and the commit it
/// peels to.
#[derive(Clone, Debug)]
struct RawTag {
    oid: String,
    commit: CommitId,
}

/// Tag namespace of a local git repository, optionally mirrored to a remote.
#[derive(Clone, Debug)]
pub struct GitCliBackend {
    repo: PathBuf,
    git: PathBuf,
    remote: String,
    annotate: bool,
    pipeline_marker: String,
}

impl GitCliBackend {
    /// Use the repository at `repo` with remote `origin`.
    pub fn open(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            git: PathBuf::from("git"),
            remote: "origin".into(),
            annotate: true,
            pipeline_marker: DEFAULT_PIPELINE_MARKER.into(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Create tags that carry a message as annotated tags (default `true`).
    pub fn with_annotated_tags(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    pub fn with_pipeline_marker(mut self, marker: impl Into<String>) -> Self {
        self.pipeline_marker = marker.into();
        self
    }

    pub fn with_git_binary(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Resolve a revision (`HEAD`, a branch, a short sha) to a commit id.
    pub fn resolve_revision(&self, revision: &str) -> Result<CommitId> {
        let spec = format!("{revision}^{{commit}}");
        let out = self.run_ok(&["rev-parse", "--verify", "--quiet", &spec])?;
        Ok(CommitId::new(out.trim())?)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.arg("-C").arg(&self.repo).args(args);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(repo = %self.repo.display(), ?args, "git");
        Ok(self.command(args).output()?)
    }

    fn run_ok(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args)?;
        if !out.status.success() {
            return Err(git_error(args, &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn lookup(&self, name: &str) -> Result<Option<RawTag>> {
        let full = format!("refs/tags/{name}");
        let out = self.run_ok(&[
            "for-each-ref",
            "--format=%(refname)%09%(objectname)%09%(*objectname)",
            &full,
        ])?;
        for line in out.lines() {
            let mut fields = line.split('\t');
            let (Some(refname), Some(oid), peeled) = (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            if refname != full {
                continue;
            }
            let commit = match peeled {
                Some(p) if !p.is_empty() => p,
                _ => oid,
            };
            return Ok(Some(RawTag {
                oid: oid.to_string(),
                commit: CommitId::new(commit)?,
            }));
        }
        Ok(None)
    }

    /// After a failed conditional write: report a mismatch if the tag moved
    /// away from `expected`, otherwise surface the git failure.
    fn classify_failed_write(
        &self,
        name: &str,
        expected: Option<&CommitId>,
        args: &[&str],
        out: &Output,
    ) -> Result<CasOutcome> {
        let actual = self.lookup(name)?.map(|t| t.commit);
        if actual.as_ref() != expected {
            return Ok(CasOutcome::Mismatch { actual });
        }
        Err(git_error(args, out))
    }
}

fn git_error(args: &[&str], out: &Output) -> RefError {
    RefError::Git {
        command: args.join(" "),
        stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
    }
}

impl RefBackend for GitCliBackend {
    fn read(&self, name: &str) -> Result<Option<CommitId>> {
        Ok(self.lookup(name)?.map(|t| t.commit))
    }

    fn create_if_absent(
        &self,
        name: &str,
        commit: &CommitId,
        message: Option<&str>,
    ) -> Result<CreateOutcome> {
        let full = format!("refs/tags/{name}");
        let args: Vec<&str> = match message {
            Some(msg) if self.annotate => vec![
                "tag",
                "-a",
                "-m",
                msg,
                "--end-of-options",
                name,
                commit.as_str(),
            ],
            _ => vec![
                "update-ref",
                "--end-of-options",
                full.as_str(),
                commit.as_str(),
                "",
            ],
        };
        let out = self.run(&args)?;
        if out.status.success() {
            return Ok(CreateOutcome::Created);
        }
        match self.lookup(name)? {
            Some(existing) => Ok(CreateOutcome::Exists(existing.commit)),
            None => Err(git_error(&args, &out)),
        }
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<&CommitId>,
        new: &CommitId,
    ) -> Result<CasOutcome> {
        let current = self.lookup(name)?;
        let actual = current.as_ref().map(|t| t.commit.clone());
        if actual.as_ref() != expected {
            return Ok(CasOutcome::Mismatch { actual });
        }
        let full = format!("refs/tags/{name}");
        let old = current.map(|t| t.oid).unwrap_or_default();
        let args = [
            "update-ref",
            "--end-of-options",
            full.as_str(),
            new.as_str(),
            old.as_str(),
        ];
        let out = self.run(&args)?;
        if out.status.success() {
            return Ok(CasOutcome::Swapped);
        }
        self.classify_failed_write(name, expected, &args, &out)
    }

    fn compare_and_delete(&self, name: &str, expected: &CommitId) -> Result<CasOutcome> {
        let current = match self.lookup(name)? {
            Some(t) if &t.commit == expected => t,
            other => {
                return Ok(CasOutcome::Mismatch {
                    actual: other.map(|t| t.commit),
                })
            }
        };
        let full = format!("refs/tags/{name}");
        let args = [
            "update-ref",
            "-d",
            "--end-of-options",
            full.as_str(),
            current.oid.as_str(),
        ];
        let out = self.run(&args)?;
        if out.status.success() {
            return Ok(CasOutcome::Swapped);
        }
        self.classify_failed_write(name, Some(expected), &args, &out)
    }

    fn list(&self, prefix: &str) -> Result<Vec<(String, CommitId)>> {
        let out = self.run_ok(&[
            "for-each-ref",
            "--format=%(refname)%09%(objectname)%09%(*objectname)",
            "refs/tags/",
        ])?;
        let mut tags = Vec::new();
        for line in out.lines() {
            let mut fields = line.split('\t');
            let (Some(refname), Some(oid), peeled) = (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let Some(name) = refname.strip_prefix("refs/tags/") else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            let commit = match peeled {
                Some(p) if !p.is_empty() => p,
                _ => oid,
            };
            tags.push((name.to_string(), CommitId::new(commit)?));
        }
        tags.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(tags)
    }
}

impl RemoteMirror for GitCliBackend {
    fn remote_name(&self) -> &str {
        &self.remote
    }

    fn publish(&self, name: &str, force: bool) -> Result<()> {
        let refspec = format!(
            "{}refs/tags/{name}:refs/tags/{name}",
            if force { "+" } else { "" }
        );
        let args = [
            "push",
            "--end-of-options",
            self.remote.as_str(),
            refspec.as_str(),
        ];
        debug!(repo = %self.repo.display(), ?args, "git");
        let out = self
            .command(&args)
            .env(&self.pipeline_marker, "1")
            .output()?;
        if !out.status.success() {
            return Err(RefError::PushRejected {
                remote: self.remote.clone(),
                name: name.to_string(),
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn remote_points_at(&self, name: &str) -> Result<Option<CommitId>> {
        let out = self.run_ok(&[
            "ls-remote",
            "--tags",
            "--end-of-options",
            self.remote.as_str(),
        ])?;
        let full = format!("refs/tags/{name}");
        let peeled_name = format!("{full}^{{}}");
        let mut direct = None;
        for line in out.lines() {
            let Some((oid, refname)) = line.split_once('\t') else {
                continue;
            };
            if refname == peeled_name {
                return Ok(Some(CommitId::new(oid)?));
            }
            if refname == full {
                direct = Some(CommitId::new(oid)?);
            }
        }
        Ok(direct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PushOutcome;
    use crate::classify::TagValidator;
    use crate::store::TagStore;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn sh(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    /// A repository with two commits; returns (dir, first, second).
    fn repo_with_commits() -> (TempDir, CommitId, CommitId) {
        let dir = TempDir::new().unwrap();
        let p = dir.path();
        sh(p, &["init", "-q"]);
        sh(p, &["config", "user.name", "Ledger Test"]);
        sh(p, &["config", "user.email", "ledger@example.com"]);
        sh(p, &["config", "commit.gpgsign", "false"]);
        sh(p, &["config", "tag.gpgsign", "false"]);
        sh(p, &["commit", "-q", "--allow-empty", "-m", "first"]);
        let first = CommitId::new(sh(p, &["rev-parse", "HEAD"])).unwrap();
        sh(p, &["commit", "-q", "--allow-empty", "-m", "second"]);
        let second = CommitId::new(sh(p, &["rev-parse", "HEAD"])).unwrap();
        (dir, first, second)
    }

    fn configure_identity(p: &Path) {
        sh(p, &["config", "user.name", "Ledger Test"]);
        sh(p, &["config", "user.email", "ledger@example.com"]);
        sh(p, &["config", "tag.gpgsign", "false"]);
    }

    /// A bare remote seeded from `dir`, registered there as `origin`.
    fn bare_remote_for(dir: &Path) -> TempDir {
        let bare = TempDir::new().unwrap();
        sh(bare.path(), &["init", "-q", "--bare"]);
        sh(dir, &["remote", "add", "origin", bare.path().to_str().unwrap()]);
        sh(dir, &["push", "-q", "origin", "HEAD:refs/heads/main"]);
        bare
    }

    /// A second working repository that fetched `main` from `bare`.
    fn second_clone(bare: &Path) -> TempDir {
        let dir = TempDir::new().unwrap();
        let p = dir.path();
        sh(p, &["init", "-q"]);
        configure_identity(p);
        sh(p, &["remote", "add", "origin", bare.to_str().unwrap()]);
        sh(p, &["fetch", "-q", "origin", "main"]);
        dir
    }

    fn store_for(dir: &Path) -> TagStore<GitCliBackend> {
        let backend = GitCliBackend::open(dir);
        TagStore::new(backend.clone(), TagValidator::default()).with_remote(Box::new(backend))
    }

    #[test]
    fn annotated_create_peels_to_commit() {
        if !git_available() {
            return;
        }
        let (dir, first, second) = repo_with_commits();
        let backend = GitCliBackend::open(dir.path());

        let outcome = backend
            .create_if_absent("api/v1.0.0", &first, Some("Release api v1.0.0"))
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created);
        assert_eq!(backend.read("api/v1.0.0").unwrap(), Some(first.clone()));

        let again = backend
            .create_if_absent("api/v1.0.0", &second, Some("again"))
            .unwrap();
        assert_eq!(again, CreateOutcome::Exists(first));
    }

    #[test]
    fn lightweight_cas_and_delete() {
        if !git_available() {
            return;
        }
        let (dir, first, second) = repo_with_commits();
        let backend = GitCliBackend::open(dir.path());

        assert_eq!(
            backend.compare_and_swap("staging", None, &first).unwrap(),
            CasOutcome::Swapped
        );
        assert_eq!(
            backend.compare_and_swap("staging", None, &second).unwrap(),
            CasOutcome::Mismatch {
                actual: Some(first.clone())
            }
        );
        assert_eq!(
            backend
                .compare_and_swap("staging", Some(&first), &second)
                .unwrap(),
            CasOutcome::Swapped
        );
        assert_eq!(backend.read("staging").unwrap(), Some(second.clone()));

        assert!(matches!(
            backend.compare_and_delete("staging", &first).unwrap(),
            CasOutcome::Mismatch { .. }
        ));
        assert_eq!(
            backend.compare_and_delete("staging", &second).unwrap(),
            CasOutcome::Swapped
        );
        assert_eq!(backend.read("staging").unwrap(), None);
    }

    #[test]
    fn list_filters_by_prefix_and_peels() {
        if !git_available() {
            return;
        }
        let (dir, first, second) = repo_with_commits();
        let backend = GitCliBackend::open(dir.path());
        backend
            .create_if_absent("api/v1.0.0", &first, Some("annotated"))
            .unwrap();
        backend.create_if_absent("api/staging", &second, None).unwrap();
        backend.create_if_absent("web/v1.0.0", &second, None).unwrap();

        let api = backend.list("api/").unwrap();
        assert_eq!(
            api,
            vec![
                ("api/staging".to_string(), second),
                ("api/v1.0.0".to_string(), first),
            ]
        );
    }

    #[test]
    fn lookup_does_not_match_nested_names() {
        if !git_available() {
            return;
        }
        let (dir, first, _) = repo_with_commits();
        let backend = GitCliBackend::open(dir.path());
        backend.create_if_absent("api/v1.0.0", &first, None).unwrap();
        assert_eq!(backend.read("api").unwrap(), None);
    }

    #[test]
    fn resolve_revision_head() {
        if !git_available() {
            return;
        }
        let (dir, _, second) = repo_with_commits();
        let backend = GitCliBackend::open(dir.path());
        assert_eq!(backend.resolve_revision("HEAD").unwrap(), second);
        assert!(backend.resolve_revision("no-such-branch").is_err());
    }

    #[test]
    fn publish_and_read_back_remote() {
        if !git_available() {
            return;
        }
        let (dir, first, second) = repo_with_commits();
        let bare = TempDir::new().unwrap();
        sh(bare.path(), &["init", "-q", "--bare"]);
        let bare_path = bare.path().to_str().unwrap();
        sh(dir.path(), &["remote", "add", "origin", bare_path]);

        let backend = GitCliBackend::open(dir.path());
        backend
            .create_if_absent("v1.0.0", &first, Some("Release v1.0.0"))
            .unwrap();
        backend.publish("v1.0.0", false).unwrap();
        assert_eq!(backend.remote_points_at("v1.0.0").unwrap(), Some(first.clone()));

        backend.compare_and_swap("production", None, &first).unwrap();
        backend.publish("production", true).unwrap();
        backend
            .compare_and_swap("production", Some(&first), &second)
            .unwrap();
        backend.publish("production", true).unwrap();
        assert_eq!(backend.remote_points_at("production").unwrap(), Some(second));
        assert_eq!(backend.remote_points_at("missing").unwrap(), None);
    }

    #[test]
    fn option_like_names_never_reach_git_as_flags() {
        if !git_available() {
            return;
        }
        let (dir, first, _) = repo_with_commits();
        let backend = GitCliBackend::open(dir.path());

        assert!(TagValidator::default().classify("-fm/v1.0.0").is_err());
        assert!(backend
            .create_if_absent("-fm/v1.0.0", &first, Some("Release"))
            .is_err());
        assert_eq!(sh(dir.path(), &["tag", "-l"]), "");
    }

    #[test]
    fn same_release_from_two_pipelines_is_confirmed() {
        if !git_available() {
            return;
        }
        let (a, _, second) = repo_with_commits();
        let bare = bare_remote_for(a.path());
        let b = second_clone(bare.path());

        let store_a = store_for(a.path());
        let store_b = store_for(b.path());
        let v = store_a.classify("v1.0.0").unwrap();
        store_a.create(&v, &second, "Release v1.0.0 from A").unwrap();
        store_b.create(&v, &second, "Release v1.0.0 from B").unwrap();

        let origin = PushOutcome::Confirmed {
            remote: "origin".into(),
        };
        assert_eq!(store_a.publish(&v).unwrap(), origin);
        assert_eq!(store_b.publish(&v).unwrap(), origin);
    }

    #[test]
    fn rejected_push_of_conflicting_release_is_drift() {
        if !git_available() {
            return;
        }
        let (a, first, second) = repo_with_commits();
        let bare = bare_remote_for(a.path());
        let b = second_clone(bare.path());

        let store_a = store_for(a.path());
        let store_b = store_for(b.path());
        let v = store_a.classify("v2.0.0").unwrap();
        store_a.create(&v, &second, "Release v2.0.0").unwrap();
        store_b.create(&v, &first, "Release v2.0.0").unwrap();
        store_a.publish(&v).unwrap();

        let outcome = store_b.publish(&v).unwrap();
        let drift = outcome.drift().expect("drift expected");
        assert_eq!(drift.intended, first);
        assert_eq!(drift.observed, Some(second));
    }

    #[cfg(unix)]
    #[test]
    fn ledger_pushes_carry_the_pipeline_marker() {
        use std::os::unix::fs::PermissionsExt;

        if !git_available() {
            return;
        }
        let (dir, first, _) = repo_with_commits();
        let _bare = bare_remote_for(dir.path());

        let seen = dir.path().join("marker-seen");
        let hook = dir.path().join(".git/hooks/pre-push");
        std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
        std::fs::write(
            &hook,
            format!(
                "#!/bin/sh\nprintf '%s' \"${DEFAULT_PIPELINE_MARKER}\" > '{}'\ncat > /dev/null\nexit 0\n",
                seen.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

        let store = store_for(dir.path());
        let prod = store.classify("production").unwrap();
        store.move_tag(&prod, &first).unwrap();
        assert!(matches!(
            store.publish(&prod).unwrap(),
            PushOutcome::Confirmed { .. }
        ));
        assert_eq!(std::fs::read_to_string(&seen).unwrap(), "1");
    }
}
