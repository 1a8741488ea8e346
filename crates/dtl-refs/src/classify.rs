//! The tag name grammar.
//!
//! ```text
//! STATE        [<subproject>/]v<major>.<minor>.<patch>[-<prerelease>]-<state>
//! VERSION      [<subproject>/]v<major>.<minor>.<patch>[-<prerelease>]
//! ENVIRONMENT  [<subproject>/]<environment>
//! ```
//!
//! Alternatives are tried in that order. A prerelease only becomes a state
//! suffix when the name ends in exactly `-stable`, `-unstable` or
//! `-deprecated`; `v1.2.3-foo` is a version with prerelease `foo`. The
//! subproject is everything before the last `/`.

use std::collections::BTreeSet;

use dtl_types::{check_ref_name, Semver, Subproject, TagKind, TagState, TypeError};

use crate::error::{ClassifyError, GrammarAttempt};
use crate::names::TagName;

/// Classifies tag names against the grammar and a configured environment
/// allow-list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagValidator {
    environments: BTreeSet<String>,
}

impl TagValidator {
    /// Environments allowed when nothing is configured.
    pub const DEFAULT_ENVIRONMENTS: [&'static str; 5] =
        ["production", "staging", "canary", "sandbox", "performance"];

    /// Build a validator from an environment allow-list.
    ///
    /// Rejects environment names that could be confused with another
    /// alternative of the grammar: reserved state words, anything that parses
    /// as a version leaf, and names containing `/`.
    pub fn new<I, S>(environments: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for env in environments {
            let env = env.into();
            validate_environment_name(&env)?;
            set.insert(env);
        }
        Ok(Self { environments: set })
    }

    /// The allow-listed environment names, sorted.
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.environments.iter().map(String::as_str)
    }

    pub fn is_environment(&self, name: &str) -> bool {
        self.environments.contains(name)
    }

    /// Classify a tag name.
    ///
    /// ```
    /// use dtl_refs::TagValidator;
    /// use dtl_types::TagKind;
    ///
    /// let validator = TagValidator::default();
    /// assert_eq!(validator.classify("v1.2.3").unwrap().kind(), TagKind::Version);
    /// assert_eq!(validator.classify("api/v1.2.3-stable").unwrap().kind(), TagKind::State);
    /// assert_eq!(validator.classify("staging").unwrap().kind(), TagKind::Environment);
    /// assert!(validator.classify("release-candidate").is_err());
    /// ```
    pub fn classify(&self, name: &str) -> Result<TagName, ClassifyError> {
        check_ref_name(name).map_err(|reason| ClassifyError::RefSyntax {
            name: name.to_string(),
            reason,
        })?;

        let (subproject, leaf) = match name.rsplit_once('/') {
            Some((prefix, leaf)) => {
                let sub = Subproject::new(prefix).map_err(|e| ClassifyError::RefSyntax {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;
                (Some(sub), leaf)
            }
            None => (None, name),
        };

        let mut attempts = Vec::with_capacity(3);

        match parse_state_leaf(leaf) {
            Ok((version, state)) => {
                return Ok(TagName::State {
                    subproject,
                    version,
                    state,
                })
            }
            Err(reason) => attempts.push(GrammarAttempt {
                alternative: TagKind::State,
                reason,
            }),
        }

        let version_attempt = match state_suffix(leaf) {
            Some((_, state)) => Err(format!(
                "'{leaf}' ends in '-{state}', which only a state tag may do"
            )),
            None => parse_version_leaf(leaf),
        };
        match version_attempt {
            Ok(version) => return Ok(TagName::Version { subproject, version }),
            Err(reason) => attempts.push(GrammarAttempt {
                alternative: TagKind::Version,
                reason,
            }),
        }

        if self.environments.contains(leaf) {
            return Ok(TagName::Environment {
                subproject,
                environment: leaf.to_string(),
            });
        }
        attempts.push(GrammarAttempt {
            alternative: TagKind::Environment,
            reason: format!(
                "'{leaf}' is not a configured environment (allowed: {})",
                self.environments
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });

        Err(ClassifyError::NoAlternativeMatched {
            name: name.to_string(),
            attempts,
        })
    }

    /// Classify `name` and require a specific tag kind.
    pub fn classify_as(&self, name: &str, expected: TagKind) -> Result<TagName, ClassifyError> {
        let tag = self.classify(name)?;
        if tag.kind() != expected {
            return Err(ClassifyError::WrongKind {
                name: name.to_string(),
                expected,
                found: tag.kind(),
            });
        }
        Ok(tag)
    }

    /// Name of the version tag for `version` (with or without leading `v`).
    pub fn version_tag(
        &self,
        subproject: Option<&Subproject>,
        version: &str,
    ) -> Result<TagName, ClassifyError> {
        let leaf = if version.starts_with('v') {
            version.to_string()
        } else {
            format!("v{version}")
        };
        self.classify_as(&Subproject::qualify(subproject, &leaf), TagKind::Version)
    }

    /// Name of the environment tag for `environment`.
    pub fn environment_tag(
        &self,
        subproject: Option<&Subproject>,
        environment: &str,
    ) -> Result<TagName, ClassifyError> {
        self.classify_as(
            &Subproject::qualify(subproject, environment),
            TagKind::Environment,
        )
    }

    /// Name of the state tag marking `version` with `state`.
    pub fn state_tag(
        &self,
        subproject: Option<&Subproject>,
        version: &str,
        state: TagState,
    ) -> Result<TagName, ClassifyError> {
        let version_tag = self.version_tag(subproject, version)?;
        let name = format!("{version_tag}-{state}");
        self.classify_as(&name, TagKind::State)
    }
}

impl Default for TagValidator {
    fn default() -> Self {
        Self {
            environments: Self::DEFAULT_ENVIRONMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn validate_environment_name(env: &str) -> Result<(), TypeError> {
    let reject = |reason: &str| TypeError::InvalidEnvironment {
        name: env.to_string(),
        reason: reason.to_string(),
    };
    check_ref_name(env).map_err(|reason| reject(&reason))?;
    if env.contains('/') {
        return Err(reject("must be a single path component"));
    }
    if TagState::is_reserved(env) {
        return Err(reject("is a reserved state word"));
    }
    if parse_version_leaf(env).is_ok() {
        return Err(reject("would be read as a version tag"));
    }
    Ok(())
}

fn parse_version_leaf(leaf: &str) -> Result<Semver, String> {
    let core = leaf
        .strip_prefix('v')
        .ok_or_else(|| format!("'{leaf}' does not start with 'v'"))?;
    Semver::parse(core).map_err(|e| e.to_string())
}

/// Split `<rest>-<state>` when `leaf` ends in exactly a reserved state word.
fn state_suffix(leaf: &str) -> Option<(&str, TagState)> {
    TagState::ALL.into_iter().find_map(|state| {
        leaf.strip_suffix(state.as_str())
            .and_then(|rest| rest.strip_suffix('-'))
            .map(|rest| (rest, state))
    })
}

fn parse_state_leaf(leaf: &str) -> Result<(Semver, TagState), String> {
    let (versioned, state) = state_suffix(leaf)
        .ok_or_else(|| {
            format!("'{leaf}' does not end with '-stable', '-unstable' or '-deprecated'")
        })?;

    let version = parse_version_leaf(versioned)?;

    // The anchor version tag must itself classify as a version, otherwise the
    // state tag could never be valid.
    if state_suffix(&format!("v{version}")).is_some() {
        return Err(format!(
            "version '{version}' ends in a state word and cannot carry a version tag"
        ));
    }

    Ok((version, state))
}
