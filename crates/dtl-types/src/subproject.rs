use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::refname::check_ref_name;

/// Path-like prefix naming a monorepo sub-unit (`api`, `services/billing`).
///
/// The root project has no subproject; APIs take `Option<&Subproject>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subproject(String);

impl Subproject {
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        check_ref_name(&path).map_err(|reason| TypeError::InvalidSubproject {
            input: path.clone(),
            reason,
        })?;
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix a leaf tag name with this subproject.
    pub fn qualify(subproject: Option<&Subproject>, leaf: &str) -> String {
        match subproject {
            Some(sub) => format!("{}/{leaf}", sub.0),
            None => leaf.to_string(),
        }
    }
}

impl fmt::Display for Subproject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subproject {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Subproject> for String {
    fn from(s: Subproject) -> Self {
        s.0
    }
}

impl std::str::FromStr for Subproject {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_are_allowed() {
        let sub = Subproject::new("services/billing").unwrap();
        assert_eq!(Subproject::qualify(Some(&sub), "v1.0.0"), "services/billing/v1.0.0");
        assert_eq!(Subproject::qualify(None, "v1.0.0"), "v1.0.0");
    }

    #[test]
    fn rejects_unsafe_paths() {
        assert!(Subproject::new("").is_err());
        assert!(Subproject::new("api/").is_err());
        assert!(Subproject::new(".api").is_err());
        assert!(Subproject::new("a b").is_err());
    }
}
