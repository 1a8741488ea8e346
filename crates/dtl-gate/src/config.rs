use serde::{Deserialize, Serialize};

use dtl_refs::git::DEFAULT_PIPELINE_MARKER;
use dtl_types::TagKind;

/// Which tag kinds the gate protects against create and move.
///
/// Deletes of any ledger tag are protected under every policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionPolicy {
    /// Only environment tags.
    #[default]
    EnvironmentOnly,
    /// Version, state and environment tags.
    AllManagedTags,
}

impl ProtectionPolicy {
    pub fn covers(self, kind: TagKind) -> bool {
        match self {
            ProtectionPolicy::EnvironmentOnly => kind == TagKind::Environment,
            ProtectionPolicy::AllManagedTags => true,
        }
    }
}

/// Configuration for the protection gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub policy: ProtectionPolicy,
    /// Environment variable the deployment pipeline sets on its own pushes.
    pub pipeline_marker: String,
    /// Environment variable carrying an administrative override reason.
    pub override_env: String,
    /// Environment variable naming the actor; falls back to `USER`.
    pub actor_env: String,
    /// Command quoted in block messages as the sanctioned entry point.
    pub entry_point: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy: ProtectionPolicy::default(),
            pipeline_marker: DEFAULT_PIPELINE_MARKER.to_string(),
            override_env: "DTL_OVERRIDE_REASON".to_string(),
            actor_env: "DTL_ACTOR".to_string(),
            entry_point: "dtl".to_string(),
        }
    }
}

impl GateConfig {
    /// Protect every managed tag kind, not only environments.
    pub fn strict() -> Self {
        Self {
            policy: ProtectionPolicy::AllManagedTags,
            ..Default::default()
        }
    }
}
