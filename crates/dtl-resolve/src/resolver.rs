//! [`VersionResolver`]: semantic version ordering and rollback target
//! selection.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use dtl_refs::{RefBackend, Tag, TagName, TagQuery, TagStore};
use dtl_types::{CommitId, Semver, Subproject, TagKind, TagState};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ResolveError, Result};
use crate::trace::{CandidateRecord, ComparisonStep, Partition, ResolutionTrace};

/// The version an environment should roll back to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RollbackTarget {
    pub version_tag: TagName,
    pub commit: CommitId,
    pub trace: ResolutionTrace,
}

/// Read-only resolver over a [`TagStore`].
pub struct VersionResolver<'a, B: RefBackend> {
    store: &'a TagStore<B>,
}

impl<'a, B: RefBackend> VersionResolver<'a, B> {
    pub fn new(store: &'a TagStore<B>) -> Self {
        Self { store }
    }

    /// Parse `major.minor.patch[-prerelease]`, with or without a leading `v`.
    pub fn parse_semver(input: &str) -> Result<Semver> {
        let bare = input.strip_prefix('v').unwrap_or(input);
        Ok(Semver::parse(bare)?)
    }

    /// SemVer precedence of `a` relative to `b`.
    pub fn compare(a: &Semver, b: &Semver) -> Ordering {
        a.compare(b)
    }

    /// Pick the version `environment` should roll back to.
    ///
    /// The current deployment is excluded, deprecated versions are dropped,
    /// and the highest stable version wins; unstable or unmarked versions are
    /// only used when no stable one exists. Never guesses: with no eligible
    /// candidate the result is [`ResolveError::NoRollbackTarget`].
    pub fn resolve_rollback_target(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
    ) -> Result<RollbackTarget> {
        let env_tag = self
            .store
            .validator()
            .environment_tag(subproject, environment)?;
        let mut trace = ResolutionTrace::new(env_tag.to_string());
        trace.current_commit = self.store.find(&env_tag)?;

        // One snapshot for versions and states keeps the partitioning
        // consistent even if tags change while we read.
        let snapshot = self.store.query(&TagQuery::in_subproject(subproject))?;
        let states = colocated_states(snapshot.iter(), &mut trace.mismatched_state_tags);

        for tag in snapshot.iter().filter(|t| t.kind() == TagKind::Version) {
            if trace.current_commit.as_ref() == Some(&tag.commit) {
                trace.excluded.push(tag.name.to_string());
                continue;
            }
            let Some(version) = tag.name.semver() else {
                continue;
            };
            let marks = states.get(&tag.name.to_string());
            let partition = partition_of(marks.map(|m| m.iter().map(|(_, s)| *s)));
            trace.candidates.push(CandidateRecord {
                tag: tag.name.to_string(),
                version: version.clone(),
                commit: tag.commit.clone(),
                partition,
                state_tags: marks
                    .map(|m| m.iter().map(|(name, _)| name.clone()).collect())
                    .unwrap_or_default(),
            });
        }
        debug!(
            environment = %trace.environment_tag,
            candidates = trace.candidates.len(),
            excluded = trace.excluded.len(),
            "rollback candidates partitioned"
        );

        let partition = [Partition::Stable, Partition::UnstableOrUnmarked]
            .into_iter()
            .find(|p| trace.in_partition(*p).next().is_some());
        let Some(partition) = partition else {
            return Err(ResolveError::NoRollbackTarget {
                trace: Box::new(trace),
            });
        };
        trace.partition_used = Some(partition);

        let pool: Vec<CandidateRecord> = trace.in_partition(partition).cloned().collect();
        let mut leader = &pool[0];
        for challenger in &pool[1..] {
            let ordering = Self::compare(&challenger.version, &leader.version);
            let incumbent = leader.tag.clone();
            if ordering == Ordering::Greater {
                leader = challenger;
            }
            trace.comparisons.push(ComparisonStep {
                challenger: challenger.tag.clone(),
                incumbent,
                ordering: ordering.into(),
                leader: leader.tag.clone(),
            });
        }

        let version_tag = TagName::Version {
            subproject: subproject.cloned(),
            version: leader.version.clone(),
        };
        info!(
            environment = %trace.environment_tag,
            rollback_to = %version_tag,
            commit = %leader.commit,
            partition = %partition,
            "rollback target resolved"
        );
        Ok(RollbackTarget {
            version_tag,
            commit: leader.commit.clone(),
            trace,
        })
    }
}

/// State tags that sit on their version's commit, keyed by version tag name.
///
/// State tags whose version is missing or elsewhere are pushed to
/// `mismatched`.
fn colocated_states<'t>(
    tags: impl Iterator<Item = &'t Tag> + Clone,
    mismatched: &mut Vec<String>,
) -> BTreeMap<String, Vec<(String, TagState)>> {
    let versions: BTreeMap<String, &CommitId> = tags
        .clone()
        .filter(|t| t.kind() == TagKind::Version)
        .map(|t| (t.name.to_string(), &t.commit))
        .collect();

    let mut states: BTreeMap<String, Vec<(String, TagState)>> = BTreeMap::new();
    for tag in tags.filter(|t| t.kind() == TagKind::State) {
        let (Some(anchor), Some(state)) = (tag.name.anchor_version(), tag.name.state()) else {
            continue;
        };
        let anchor = anchor.to_string();
        if versions.get(&anchor) == Some(&&tag.commit) {
            states
                .entry(anchor)
                .or_default()
                .push((tag.name.to_string(), state));
        } else {
            mismatched.push(tag.name.to_string());
        }
    }
    states
}

/// The most restrictive recorded state decides the partition.
fn partition_of(states: Option<impl Iterator<Item = TagState>>) -> Partition {
    let worst = states.and_then(|s| s.max_by_key(|state| state.restrictiveness()));
    match worst {
        Some(TagState::Deprecated) => Partition::Deprecated,
        Some(TagState::Stable) => Partition::Stable,
        Some(TagState::Unstable) | None => Partition::UnstableOrUnmarked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtl_refs::{InMemoryRefBackend, TagValidator};
    use proptest::prelude::*;

    fn commit(s: &str) -> CommitId {
        CommitId::new(s).unwrap()
    }

    fn store_with(tags: &[(&str, &str)]) -> TagStore<InMemoryRefBackend> {
        let store = TagStore::new(InMemoryRefBackend::new(), TagValidator::default());
        for (name, c) in tags {
            store.backend().force_set(name, &commit(c)).unwrap();
        }
        store
    }

    fn v(s: &str) -> Semver {
        VersionResolver::<InMemoryRefBackend>::parse_semver(s).unwrap()
    }

    // ---- Test 1: the documented rollback example ----
    #[test]
    fn picks_highest_stable_version() {
        let store = store_with(&[
            ("v1.0.0", "X"),
            ("v1.0.0-deprecated", "X"),
            ("v1.1.0", "Y"),
            ("v1.1.0-stable", "Y"),
            ("v1.2.0", "Z"),
            ("production", "Z"),
        ]);
        let target = VersionResolver::new(&store)
            .resolve_rollback_target(None, "production")
            .unwrap();

        assert_eq!(target.version_tag.to_string(), "v1.1.0");
        assert_eq!(target.commit, commit("Y"));
        assert_eq!(target.trace.excluded, vec!["v1.2.0"]);
        assert_eq!(target.trace.partition_used, Some(Partition::Stable));
        assert_eq!(target.trace.candidates.len(), 2);
        assert_eq!(
            target.trace.in_partition(Partition::Deprecated).next().unwrap().tag,
            "v1.0.0"
        );
    }

    // ---- Test 2: nothing eligible ----
    #[test]
    fn deprecated_only_has_no_target() {
        let store = store_with(&[
            ("v1.0.0", "X"),
            ("v1.0.0-deprecated", "X"),
            ("v1.1.0", "Y"),
            ("production", "Y"),
        ]);
        let err = VersionResolver::new(&store)
            .resolve_rollback_target(None, "production")
            .unwrap_err();
        match err {
            ResolveError::NoRollbackTarget { trace } => {
                assert_eq!(trace.partition_used, None);
                assert_eq!(trace.excluded, vec!["v1.1.0"]);
                assert_eq!(trace.candidates[0].partition, Partition::Deprecated);
            }
            other => panic!("expected NoRollbackTarget, got {other:?}"),
        }
    }

    // ---- Test 3: unmarked versions are the fallback ----
    #[test]
    fn falls_back_to_unstable_or_unmarked() {
        let store = store_with(&[
            ("api/v2.0.0", "A"),
            ("api/v2.0.0-unstable", "A"),
            ("api/v2.1.0", "B"),
            ("api/v2.2.0", "C"),
            ("api/staging", "C"),
            // Other subprojects never leak in.
            ("web/v9.9.9", "W"),
            ("web/v9.9.9-stable", "W"),
        ]);
        let api = Subproject::new("api").unwrap();
        let target = VersionResolver::new(&store)
            .resolve_rollback_target(Some(&api), "staging")
            .unwrap();
        assert_eq!(target.version_tag.to_string(), "api/v2.1.0");
        assert_eq!(target.trace.partition_used, Some(Partition::UnstableOrUnmarked));
        assert_eq!(target.trace.comparisons.len(), 1);
        assert_eq!(target.trace.comparisons[0].leader, "api/v2.1.0");
    }

    // ---- Test 4: most restrictive state wins ----
    #[test]
    fn deprecated_overrides_stable_on_same_version() {
        let store = store_with(&[
            ("v1.0.0", "X"),
            ("v1.0.0-stable", "X"),
            ("v1.0.0-deprecated", "X"),
            ("v0.9.0", "W"),
            ("v0.9.0-stable", "W"),
            ("canary", "Q"),
        ]);
        let target = VersionResolver::new(&store)
            .resolve_rollback_target(None, "canary")
            .unwrap();
        assert_eq!(target.version_tag.to_string(), "v0.9.0");
        // An untracked deployment excludes nothing.
        assert!(target.trace.excluded.is_empty());
    }

    // ---- Test 5: misplaced state tags are ignored ----
    #[test]
    fn state_tag_on_other_commit_is_ignored() {
        let store = store_with(&[
            ("v1.0.0", "X"),
            ("v1.0.0-deprecated", "ELSEWHERE"),
            ("v1.1.0", "Y"),
            ("production", "Y"),
        ]);
        let target = VersionResolver::new(&store)
            .resolve_rollback_target(None, "production")
            .unwrap();
        assert_eq!(target.version_tag.to_string(), "v1.0.0");
        assert_eq!(target.trace.mismatched_state_tags, vec!["v1.0.0-deprecated"]);
    }

    // ---- Test 6: prerelease ordering in the comparison path ----
    #[test]
    fn release_beats_its_prereleases() {
        let store = store_with(&[
            ("v2.0.0-rc.1", "R1"),
            ("v2.0.0-rc.1-stable", "R1"),
            ("v2.0.0", "R"),
            ("v2.0.0-stable", "R"),
            ("v2.0.0-rc.2", "R2"),
            ("v2.0.0-rc.2-stable", "R2"),
            ("v3.0.0", "NOW"),
            ("production", "NOW"),
        ]);
        let target = VersionResolver::new(&store)
            .resolve_rollback_target(None, "production")
            .unwrap();
        assert_eq!(target.version_tag.to_string(), "v2.0.0");
        assert_eq!(target.trace.comparisons.len(), 2);
    }

    // ---- Test 7: unknown environment is a format error ----
    #[test]
    fn unknown_environment_is_invalid_format() {
        let store = store_with(&[]);
        let err = VersionResolver::new(&store)
            .resolve_rollback_target(None, "moon")
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidFormat(_)));
    }

    // ---- Test 8: trace serializes as structured data ----
    #[test]
    fn trace_is_json() {
        let store = store_with(&[("v1.0.0", "X"), ("v1.1.0", "Y"), ("staging", "Y")]);
        let target = VersionResolver::new(&store)
            .resolve_rollback_target(None, "staging")
            .unwrap();
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["version_tag"], "v1.0.0");
        assert_eq!(json["trace"]["partition_used"], "UNSTABLE_OR_UNMARKED");
        assert_eq!(json["trace"]["candidates"][0]["version"], "1.0.0");
        assert!(target.trace.to_string().contains("partition used:  UNSTABLE_OR_UNMARKED"));
    }

    #[test]
    fn parse_semver_accepts_optional_v() {
        assert_eq!(v("v1.2.3"), v("1.2.3"));
        assert!(VersionResolver::<InMemoryRefBackend>::parse_semver("1.2").is_err());
        assert!(VersionResolver::<InMemoryRefBackend>::parse_semver("1.2.3+b").is_err());
    }

    #[test]
    fn compare_follows_precedence_chain() {
        let chain = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.0.1",
            "1.1.0",
            "2.0.0",
        ];
        for pair in chain.windows(2) {
            assert_eq!(
                VersionResolver::<InMemoryRefBackend>::compare(&v(pair[0]), &v(pair[1])),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    fn arb_version() -> impl Strategy<Value = Semver> {
        (0u64..5, 0u64..5, 0u64..5, proptest::option::of("[a-z]{1,3}(\\.[1-9][0-9]?)?"))
            .prop_map(|(a, b, c, pre)| match pre {
                Some(pre) => Semver::parse(&format!("{a}.{b}.{c}-{pre}")).unwrap(),
                None => Semver::new(a, b, c),
            })
    }

    proptest! {
        #[test]
        fn compare_is_antisymmetric(a in arb_version(), b in arb_version()) {
            let ab = VersionResolver::<InMemoryRefBackend>::compare(&a, &b);
            let ba = VersionResolver::<InMemoryRefBackend>::compare(&b, &a);
            prop_assert_eq!(ab, ba.reverse());
            prop_assert_eq!(ab == Ordering::Equal, a == b);
        }
    }
}
