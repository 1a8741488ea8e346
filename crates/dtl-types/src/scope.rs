use std::fmt;

use serde::{Deserialize, Serialize};

use crate::subproject::Subproject;

/// Rendering of the root project inside a scope key. Ref components can never
/// start with `.`, so this cannot collide with a real subproject.
pub const ROOT_SCOPE: &str = ".";

/// Key handed to the external scheduler so that two mutations of the same
/// `(subproject, environment)` pair run one at a time.
///
/// The ledger computes the key but never enforces it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictScopeKey(String);

impl ConflictScopeKey {
    pub fn new(subproject: Option<&Subproject>, environment: &str) -> Self {
        let scope = subproject.map(Subproject::as_str).unwrap_or(ROOT_SCOPE);
        Self(format!("{scope}/{environment}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConflictScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
