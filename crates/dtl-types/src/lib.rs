//! Foundation types for the Deployment Tag Ledger (DTL).
//!
//! The ledger stores deployment facts as git tags. This crate holds the
//! vocabulary every other DTL crate shares: what a commit identifier is, how
//! versions order, which quality states exist and how a conflict scope key is
//! rendered.
//!
//! # Key Types
//!
//! - [`CommitId`] — Opaque content-addressed commit identifier
//! - [`Semver`] — `major.minor.patch[-prerelease]` with SemVer precedence
//! - [`TagKind`] — Closed set of tag types (version, environment, state)
//! - [`TagState`] — Quality state recorded by state tags
//! - [`Subproject`] — Monorepo sub-unit prefix
//! - [`ConflictScopeKey`] — Serialization key for concurrent deployments

pub mod commit;
pub mod error;
pub mod kind;
pub mod refname;
pub mod scope;
pub mod subproject;
pub mod version;

pub use commit::CommitId;
pub use error::TypeError;
pub use kind::{TagKind, TagState};
pub use refname::check_ref_name;
pub use scope::ConflictScopeKey;
pub use subproject::Subproject;
pub use version::Semver;
