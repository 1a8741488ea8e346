//! Tag classification and storage for the Deployment Tag Ledger.
//!
//! The ledger records deployment facts as tags in a shared namespace that is
//! only eventually consistent across clones. This crate is the single way in
//! and out of that namespace.
//!
//! # Architecture
//!
//! - **Version tags** (`api/v1.2.0`) are immutable pointers to released
//!   commits.
//! - **State tags** (`api/v1.2.0-stable`) are immutable quality marks that
//!   must sit on the same commit as their version tag.
//! - **Environment tags** (`api/production`) are the only movable tags. They
//!   are replaced atomically on every deployment and never deleted in normal
//!   flow.
//!
//! Every write goes through an atomic primitive of the [`RefBackend`]:
//! create-if-absent, compare-and-swap or compare-and-delete. There is no
//! delete-then-create path anywhere.
//!
//! # Modules
//!
//! - [`error`] — Error types for classification and store operations
//! - [`names`] — The typed [`TagName`] and [`Tag`] records
//! - [`classify`] — The [`TagValidator`] grammar
//! - [`backend`] — The [`RefBackend`] and [`RemoteMirror`] traits
//! - [`memory`] — In-memory backend and remote for tests
//! - [`git`] — [`GitCliBackend`] driving the `git` binary
//! - [`store`] — [`TagStore`] with the create/move/delete/query contracts

pub mod backend;
pub mod classify;
pub mod error;
pub mod git;
pub mod memory;
pub mod names;
pub mod store;

pub use backend::{CasOutcome, CreateOutcome, PushOutcome, PushRaceDrift, RefBackend, RemoteMirror};
pub use classify::TagValidator;
pub use error::{ClassifyError, GrammarAttempt, RefError, Result};
pub use git::GitCliBackend;
pub use memory::{InMemoryRefBackend, InMemoryRemote};
pub use names::{Tag, TagName};
pub use store::{
    AdminOverride, CreateReceipt, MoveReceipt, SubprojectScope, TagQuery, TagSet, TagStore,
    MAX_CAS_ATTEMPTS,
};
