//! Read-side reasoning over the Deployment Tag Ledger.
//!
//! Nothing in this crate writes tags. It answers two questions from a
//! snapshot of the tag namespace:
//!
//! - which version is deployed to an environment ([`DeploymentStateTracker`])
//! - which version an environment should roll back to ([`VersionResolver`])
//!
//! Rollback resolution is deterministic and fully traced: the
//! [`ResolutionTrace`] records every candidate, its partition and each
//! precedence comparison, so an operator can see why a target was chosen or
//! why none exists.
//!
//! # Modules
//!
//! - [`error`] — [`ResolveError`] and the crate `Result` alias
//! - [`resolver`] — Semantic version ordering and rollback selection
//! - [`trace`] — Structured reasoning records
//! - [`tracker`] — Current deployment per environment

pub mod error;
pub mod resolver;
pub mod trace;
pub mod tracker;

pub use error::{ResolveError, Result};
pub use resolver::{RollbackTarget, VersionResolver};
pub use trace::{CandidateRecord, ComparisonStep, Partition, Precedence, ResolutionTrace};
pub use tracker::{CurrentDeployment, DeploymentStateTracker, EnvironmentSnapshot, VersionViolation};
