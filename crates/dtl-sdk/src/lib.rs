//! High-level SDK for the Deployment Tag Ledger.
//!
//! Provides one API over tag classification, the atomic tag store, rollback
//! resolution and the protection gate. This is the main entry point for the
//! `dtl` binary and for pipelines embedding the ledger.

pub mod config;
pub mod error;
pub mod ledger;

pub use config::{LedgerConfig, CONFIG_FILE_NAME};
pub use error::{SdkError, SdkResult};
pub use ledger::{DeleteReport, DeployReport, DeploymentLedger, MarkReport, ReleaseReport, RollbackReport};

// Re-export key types
pub use dtl_gate::{ActorContext, GateConfig, GateVerdict, ProtectionPolicy, Verdict};
pub use dtl_refs::{AdminOverride, GitCliBackend, InMemoryRefBackend, PushOutcome, TagName, TagValidator};
pub use dtl_resolve::{CurrentDeployment, EnvironmentSnapshot, ResolutionTrace, RollbackTarget};
pub use dtl_types::{CommitId, ConflictScopeKey, Semver, Subproject, TagKind, TagState};
