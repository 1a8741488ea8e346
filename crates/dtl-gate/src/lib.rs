//! Protection gate for the Deployment Tag Ledger.
//!
//! Environment tags (and, by policy, every managed tag) may only be mutated
//! by the deployment automation. The gate runs each proposed mutation through
//! a fail-fast pipeline of named checks and answers `ALLOW` or `BLOCK`. A
//! manual mutation is allowed only with an explicit override, which produces
//! an audit record.
//!
//! The gate is a client-side control: it runs in the `pre-push` hook and in
//! the `dtl` commands, and a client that bypasses both is not stopped.
//!
//! # Quick Start
//!
//! ```rust
//! use dtl_gate::{ActorContext, GateConfig, ProtectionGate, RefMutation};
//! use dtl_refs::TagValidator;
//! use dtl_types::CommitId;
//!
//! let gate = ProtectionGate::with_default_stages(TagValidator::default(), GateConfig::default());
//! let mutation = RefMutation::moving("production", CommitId::new("abc123").unwrap());
//!
//! let verdict = gate.evaluate(&mutation, &ActorContext::manual("alex")).unwrap();
//! assert!(!verdict.is_allowed());
//!
//! let verdict = gate.evaluate(&mutation, &ActorContext::automation("ci")).unwrap();
//! assert!(verdict.is_allowed());
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod gate;
pub mod hook;
pub mod stage;
pub mod stages;

// Re-exports for convenience.
pub use audit::AuditRecord;
pub use config::{GateConfig, ProtectionPolicy};
pub use error::{GateError, Result};
pub use gate::{GateVerdict, ProtectionGate, Verdict};
pub use hook::{parse_pre_push, parse_pre_push_line};
pub use stage::{
    ActorContext, GateContext, GateStage, MutationOperation, OverrideSignal, RefMutation,
    StageDecision, StageResult,
};
pub use stages::{ClassificationStage, OriginStage, OverrideStage};
