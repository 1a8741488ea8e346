//! Structured reasoning record for rollback resolution.
//!
//! Reports and operators consume the trace as data (`serde`), so every step
//! the resolver takes is recorded with the tags involved rather than as
//! free-form text.

use std::cmp::Ordering;
use std::fmt;

use dtl_types::{CommitId, Semver};
use serde::Serialize;

/// Rollback eligibility bucket of a candidate version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Partition {
    /// Marked stable and nothing more restrictive.
    Stable,
    /// Marked unstable, or not marked at all.
    UnstableOrUnmarked,
    /// Marked deprecated; never a rollback target.
    Deprecated,
}

impl Partition {
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Stable => "STABLE",
            Partition::UnstableOrUnmarked => "UNSTABLE_OR_UNMARKED",
            Partition::Deprecated => "DEPRECATED",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable form of [`Ordering`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    Lower,
    Equal,
    Higher,
}

impl From<Ordering> for Precedence {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Precedence::Lower,
            Ordering::Equal => Precedence::Equal,
            Ordering::Greater => Precedence::Higher,
        }
    }
}

/// A version tag considered for rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub tag: String,
    pub version: Semver,
    pub commit: CommitId,
    pub partition: Partition,
    /// State tags co-located with the version that decided the partition.
    pub state_tags: Vec<String>,
}

/// One comparison made while picking the maximum of a partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonStep {
    pub challenger: String,
    pub incumbent: String,
    /// Precedence of the challenger relative to the incumbent.
    pub ordering: Precedence,
    /// Leader after this step.
    pub leader: String,
}

/// Everything the resolver saw and decided.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionTrace {
    pub environment_tag: String,
    /// Commit the environment tag referenced (`None` if never deployed).
    pub current_commit: Option<CommitId>,
    /// Version tags excluded because they are the current deployment.
    pub excluded: Vec<String>,
    pub candidates: Vec<CandidateRecord>,
    /// State tags ignored because they are not on their version's commit.
    pub mismatched_state_tags: Vec<String>,
    /// Partition the winner was taken from.
    pub partition_used: Option<Partition>,
    pub comparisons: Vec<ComparisonStep>,
}

impl ResolutionTrace {
    pub(crate) fn new(environment_tag: impl Into<String>) -> Self {
        Self {
            environment_tag: environment_tag.into(),
            ..Self::default()
        }
    }

    /// Candidates that fell into `partition`, in namespace order.
    pub fn in_partition(&self, partition: Partition) -> impl Iterator<Item = &CandidateRecord> {
        self.candidates
            .iter()
            .filter(move |c| c.partition == partition)
    }
}

impl fmt::Display for ResolutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "environment tag: {}", self.environment_tag)?;
        match &self.current_commit {
            Some(commit) => writeln!(f, "current commit:  {}", commit.short())?,
            None => writeln!(f, "current commit:  <never deployed>")?,
        }
        for tag in &self.excluded {
            writeln!(f, "  excluded {tag} (current deployment)")?;
        }
        for candidate in &self.candidates {
            write!(
                f,
                "  candidate {} [{}] at {}",
                candidate.tag,
                candidate.partition,
                candidate.commit.short()
            )?;
            if candidate.state_tags.is_empty() {
                writeln!(f)?;
            } else {
                writeln!(f, " via {}", candidate.state_tags.join(", "))?;
            }
        }
        for tag in &self.mismatched_state_tags {
            writeln!(f, "  ignored {tag} (not on its version's commit)")?;
        }
        match self.partition_used {
            Some(partition) => writeln!(f, "partition used:  {partition}")?,
            None => writeln!(f, "partition used:  <none>")?,
        }
        for step in &self.comparisons {
            writeln!(
                f,
                "  {} vs {}: {:?} -> leader {}",
                step.challenger, step.incumbent, step.ordering, step.leader
            )?;
        }
        Ok(())
    }
}
