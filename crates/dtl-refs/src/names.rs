//! Typed tag names and tag records.

use std::fmt;

use dtl_types::{CommitId, Semver, Subproject, TagKind, TagState};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// A classified tag name.
///
/// The variant *is* the tag type; there is no separate type field that could
/// disagree with the name. `Display` renders the canonical wire name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TagName {
    /// `[<subproject>/]v<version>`
    Version {
        subproject: Option<Subproject>,
        version: Semver,
    },
    /// `[<subproject>/]<environment>`
    Environment {
        subproject: Option<Subproject>,
        environment: String,
    },
    /// `[<subproject>/]v<version>-<state>`
    State {
        subproject: Option<Subproject>,
        version: Semver,
        state: TagState,
    },
}

impl TagName {
    pub fn kind(&self) -> TagKind {
        match self {
            TagName::Version { .. } => TagKind::Version,
            TagName::Environment { .. } => TagKind::Environment,
            TagName::State { .. } => TagKind::State,
        }
    }

    pub fn subproject(&self) -> Option<&Subproject> {
        match self {
            TagName::Version { subproject, .. }
            | TagName::Environment { subproject, .. }
            | TagName::State { subproject, .. } => subproject.as_ref(),
        }
    }

    /// The version carried by version and state tags.
    pub fn semver(&self) -> Option<&Semver> {
        match self {
            TagName::Version { version, .. } | TagName::State { version, .. } => Some(version),
            TagName::Environment { .. } => None,
        }
    }

    pub fn environment(&self) -> Option<&str> {
        match self {
            TagName::Environment { environment, .. } => Some(environment),
            TagName::Version { .. } | TagName::State { .. } => None,
        }
    }

    pub fn state(&self) -> Option<TagState> {
        match self {
            TagName::State { state, .. } => Some(*state),
            TagName::Version { .. } | TagName::Environment { .. } => None,
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.kind().is_mutable()
    }

    /// For a state tag, the version tag it must be co-located with.
    pub fn anchor_version(&self) -> Option<TagName> {
        match self {
            TagName::State {
                subproject,
                version,
                ..
            } => Some(TagName::Version {
                subproject: subproject.clone(),
                version: version.clone(),
            }),
            TagName::Version { .. } | TagName::Environment { .. } => None,
        }
    }

    /// Full ref path in a git repository.
    pub fn ref_path(&self) -> String {
        format!("refs/tags/{self}")
    }

    fn leaf(&self) -> String {
        match self {
            TagName::Version { version, .. } => format!("v{version}"),
            TagName::Environment { environment, .. } => environment.clone(),
            TagName::State { version, state, .. } => format!("v{version}-{state}"),
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Subproject::qualify(self.subproject(), &self.leaf()))
    }
}

impl Serialize for TagName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A tag and the commit it currently references.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: TagName,
    pub commit: CommitId,
}

impl Tag {
    pub fn new(name: TagName, commit: CommitId) -> Self {
        Self { name, commit }
    }

    pub fn kind(&self) -> TagKind {
        self.name.kind()
    }

    pub fn is_mutable(&self) -> bool {
        self.name.is_mutable()
    }

    /// Two tags are co-located when they reference the same commit.
    pub fn is_colocated_with(&self, other: &Tag) -> bool {
        self.commit == other.commit
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.commit.short())
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Tag", 8)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("kind", &self.name.kind())?;
        s.serialize_field("subproject", &self.name.subproject())?;
        s.serialize_field("semver", &self.name.semver())?;
        s.serialize_field("environment", &self.name.environment())?;
        s.serialize_field("state", &self.name.state())?;
        s.serialize_field("commit", &self.commit)?;
        s.serialize_field("mutable", &self.name.is_mutable())?;
        s.end()
    }
}
