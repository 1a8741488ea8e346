use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The closed set of tag types in the ledger.
///
/// The type is never stored: it is derived from the tag name grammar. Only
/// environment tags may be moved once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagKind {
    /// `[<subproject>/]v<semver>`: a released artifact.
    Version,
    /// `[<subproject>/]<environment>`: what is deployed where.
    Environment,
    /// `[<subproject>/]v<semver>-<state>`: quality state of a version.
    State,
}

impl TagKind {
    /// Returns `true` only for environment tags.
    pub fn is_mutable(self) -> bool {
        match self {
            TagKind::Environment => true,
            TagKind::Version | TagKind::State => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Version => "VERSION",
            TagKind::Environment => "ENVIRONMENT",
            TagKind::State => "STATE",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality state attached to a version through a state tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagState {
    Stable,
    Unstable,
    Deprecated,
}

impl TagState {
    /// Every state, in suffix-matching order.
    pub const ALL: [TagState; 3] = [TagState::Stable, TagState::Unstable, TagState::Deprecated];

    /// The reserved word used as tag suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            TagState::Stable => "stable",
            TagState::Unstable => "unstable",
            TagState::Deprecated => "deprecated",
        }
    }

    /// Returns `true` if `word` is one of the reserved state words.
    pub fn is_reserved(word: &str) -> bool {
        Self::ALL.iter().any(|s| s.as_str() == word)
    }

    /// Rank used when several states are recorded for one version.
    /// Higher is more restrictive.
    pub fn restrictiveness(self) -> u8 {
        match self {
            TagState::Stable => 0,
            TagState::Unstable => 1,
            TagState::Deprecated => 2,
        }
    }
}

impl fmt::Display for TagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagState {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| TypeError::InvalidState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_environment_is_mutable() {
        assert!(TagKind::Environment.is_mutable());
        assert!(!TagKind::Version.is_mutable());
        assert!(!TagKind::State.is_mutable());
    }

    #[test]
    fn state_words_round_trip() {
        for state in TagState::ALL {
            assert_eq!(state.as_str().parse::<TagState>().unwrap(), state);
            assert!(TagState::is_reserved(state.as_str()));
        }
        assert!("Stable".parse::<TagState>().is_err());
        assert!(!TagState::is_reserved("production"));
    }

    #[test]
    fn deprecated_is_most_restrictive() {
        assert!(TagState::Deprecated.restrictiveness() > TagState::Unstable.restrictiveness());
        assert!(TagState::Unstable.restrictiveness() > TagState::Stable.restrictiveness());
    }
}
