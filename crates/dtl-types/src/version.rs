//! Semantic versions as they appear inside version and state tags.
//!
//! The tag grammar only admits `major.minor.patch[-prerelease]`. Parsing and
//! precedence are delegated to the `semver` crate; build metadata is part of
//! SemVer 2.0 but not of the tag grammar, so it is rejected here.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A parsed `major.minor.patch[-prerelease]` version.
///
/// Ordering follows SemVer precedence: numeric core fields first, then a
/// release sorts above any prerelease of the same core, and prerelease
/// identifiers compare field by field (numeric fields numerically and below
/// alphanumeric ones, alphanumeric fields in ASCII order, a shorter field list
/// before a longer one sharing its prefix).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Semver(semver::Version);

impl Semver {
    /// Parse a bare version (no leading `v`).
    ///
    /// ```
    /// use dtl_types::Semver;
    ///
    /// let v = Semver::parse("1.4.0-rc.2").unwrap();
    /// assert_eq!(v.major(), 1);
    /// assert_eq!(v.prerelease(), Some("rc.2"));
    /// assert!(Semver::parse("v1.4.0").is_err());
    /// assert!(Semver::parse("1.4.0+build.7").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let parsed = semver::Version::parse(input).map_err(|e| TypeError::InvalidSemver {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        if !parsed.build.is_empty() {
            return Err(TypeError::InvalidSemver {
                input: input.to_string(),
                reason: "build metadata ('+...') is not allowed in tag versions".into(),
            });
        }
        Ok(Self(parsed))
    }

    /// Build a release version without prerelease.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// The prerelease segment, if any (without the leading `-`).
    pub fn prerelease(&self) -> Option<&str> {
        if self.0.pre.is_empty() {
            None
        } else {
            Some(self.0.pre.as_str())
        }
    }

    /// Precedence comparison. Equivalent to [`Ord::cmp`].
    pub fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl fmt::Debug for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Semver({})", self.0)
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Semver {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Semver> for String {
    fn from(v: Semver) -> Self {
        v.to_string()
    }
}

impl std::str::FromStr for Semver {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Semver {
        Semver::parse(s).unwrap()
    }

    #[test]
    fn parses_core_fields() {
        let version = v("10.20.30");
        assert_eq!(
            (version.major(), version.minor(), version.patch()),
            (10, 20, 30)
        );
        assert_eq!(version.prerelease(), None);
    }

    #[test]
    fn parses_prerelease_with_hyphens() {
        assert_eq!(v("1.0.0-rc-1.x").prerelease(), Some("rc-1.x"));
    }

    #[test]
    fn rejects_malformed_versions() {
        for bad in [
            "", "1", "1.2", "1.2.3.4", "01.2.3", "1.02.3", "1.2.3-", "1.2.3-rc..1",
            "1.2.3-01", "1.2.3+meta", " 1.2.3", "v1.2.3", "a.b.c",
        ] {
            assert!(Semver::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn core_fields_compare_numerically() {
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert!(v("1.0.10") > v("1.0.9"));
    }

    #[test]
    fn release_outranks_prerelease() {
        assert!(v("1.0.0") > v("1.0.0-rc.1"));
        assert!(v("1.0.0-rc.1") > v("0.9.9"));
    }

    // SemVer 2.0 precedence example chain.
    #[test]
    fn prerelease_precedence_chain() {
        let chain = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
        ];
        for pair in chain.windows(2) {
            assert_eq!(
                v(pair[0]).compare(&v(pair[1])),
                Ordering::Less,
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(v("3.1.4-pre.1").to_string(), "3.1.4-pre.1");
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&v("1.2.3-rc.1")).unwrap();
        assert_eq!(json, "\"1.2.3-rc.1\"");
        let back: Semver = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.2.3-rc.1"));
    }

    fn arb_identifier() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u64..50).prop_map(|n| n.to_string()),
            "[a-z][a-z0-9-]{0,5}",
        ]
    }

    fn arb_semver() -> impl Strategy<Value = Semver> {
        (
            0u64..5,
            0u64..5,
            0u64..5,
            proptest::collection::vec(arb_identifier(), 0..3),
        )
            .prop_map(|(major, minor, patch, pre)| {
                let text = if pre.is_empty() {
                    format!("{major}.{minor}.{patch}")
                } else {
                    format!("{major}.{minor}.{patch}-{}", pre.join("."))
                };
                Semver::parse(&text).unwrap()
            })
    }

    proptest! {
        #[test]
        fn compare_is_reflexive(a in arb_semver()) {
            prop_assert_eq!(a.compare(&a), Ordering::Equal);
        }

        #[test]
        fn compare_is_antisymmetric(a in arb_semver(), b in arb_semver()) {
            prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
            if a != b {
                prop_assert_ne!(a.compare(&b), Ordering::Equal);
            }
        }

        #[test]
        fn compare_is_transitive(a in arb_semver(), b in arb_semver(), c in arb_semver()) {
            if a.compare(&b) != Ordering::Greater && b.compare(&c) != Ordering::Greater {
                prop_assert_ne!(a.compare(&c), Ordering::Greater);
            }
        }

        #[test]
        fn display_then_parse_is_identity(a in arb_semver()) {
            prop_assert_eq!(Semver::parse(&a.to_string()).unwrap(), a);
        }
    }
}
