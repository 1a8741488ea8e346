use std::path::{Path, PathBuf};

use dtl_gate::GateConfig;
use dtl_refs::TagValidator;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// File looked up in the repository root when no config path is given.
pub const CONFIG_FILE_NAME: &str = ".dtl.toml";

/// Ledger configuration, usually read from `.dtl.toml`.
///
/// ```toml
/// environments = ["production", "staging", "qa"]
/// remote = "origin"
/// annotate = true
///
/// [gate]
/// policy = "all_managed_tags"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Allow-listed environment names.
    pub environments: Vec<String>,
    /// Remote tags are published to; `None` keeps every write local.
    pub remote: Option<String>,
    /// Create version and state tags as annotated tags.
    pub annotate: bool,
    pub gate: GateConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            environments: TagValidator::DEFAULT_ENVIRONMENTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            remote: Some("origin".to_string()),
            annotate: true,
            gate: GateConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validator()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SdkError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded ledger configuration");
        Self::from_toml_str(&text)
    }

    /// Load `explicit` if given, else `<repo>/.dtl.toml` if present, else
    /// the defaults.
    pub fn discover(repo: &Path, explicit: Option<&Path>) -> SdkResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate: PathBuf = repo.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::load(&candidate);
        }
        debug!(repo = %repo.display(), "no {CONFIG_FILE_NAME}; using defaults");
        Ok(Self::default())
    }

    /// The tag validator for the configured environments.
    pub fn validator(&self) -> SdkResult<TagValidator> {
        if self.environments.is_empty() {
            return Err(SdkError::Config("at least one environment must be configured".into()));
        }
        Ok(TagValidator::new(self.environments.iter().cloned())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtl_gate::ProtectionPolicy;

    #[test]
    fn defaults_match_documented_values() {
        let config = LedgerConfig::default();
        assert_eq!(
            config.environments,
            vec!["production", "staging", "canary", "sandbox", "performance"]
        );
        assert_eq!(config.remote.as_deref(), Some("origin"));
        assert!(config.annotate);
        assert_eq!(config.gate.policy, ProtectionPolicy::EnvironmentOnly);
        assert_eq!(config.gate.pipeline_marker, "DTL_PIPELINE");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            environments = ["production", "qa"]

            [gate]
            policy = "all_managed_tags"
            "#,
        )
        .unwrap();
        assert_eq!(config.environments, vec!["production", "qa"]);
        assert_eq!(config.gate.policy, ProtectionPolicy::AllManagedTags);
        assert_eq!(config.gate.entry_point, "dtl");
        assert_eq!(config.remote.as_deref(), Some("origin"));
        assert!(config.validator().unwrap().is_environment("qa"));
    }

    #[test]
    fn reserved_environment_is_rejected() {
        let err = LedgerConfig::from_toml_str(r#"environments = ["production", "stable"]"#)
            .unwrap_err();
        assert!(matches!(err, SdkError::Type(_)));
    }

    #[test]
    fn empty_environment_list_is_rejected() {
        let err = LedgerConfig::from_toml_str("environments = []").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn discover_reads_repo_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            LedgerConfig::discover(dir.path(), None).unwrap(),
            LedgerConfig::default()
        );

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "annotate = false\n").unwrap();
        let config = LedgerConfig::discover(dir.path(), None).unwrap();
        assert!(!config.annotate);

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            LedgerConfig::discover(dir.path(), Some(&missing)).unwrap_err(),
            SdkError::ConfigIo { .. }
        ));
    }

    #[test]
    fn toml_output_parses_back() {
        let config = LedgerConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(LedgerConfig::from_toml_str(&text).unwrap(), config);
    }
}
