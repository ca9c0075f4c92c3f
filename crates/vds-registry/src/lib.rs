//! Tree registry for Verifiable Data Structures.
//!
//! The registry owns [`Tree`](vds_types::Tree) records: it validates new
//! trees, enforces that readonly fields never change, applies the
//! ACTIVE/FROZEN state machine, and tracks soft deletion against a retention
//! window.
//!
//! # Concurrency
//!
//! Trees live in an arena indexed by id. Each tree has its own exclusive
//! [`TreeToken`]; every mutation of a tree holds that token, so mutations of
//! one tree are serialized while different trees proceed independently. The
//! arena-wide lock is held only to look up, insert, or remove a slot.
//!
//! Callers that need a tree to stay unchanged across several steps (the
//! commit path does admission, storage, and signing under one token) take
//! the token via [`TreeRegistry::tree_token`].
//!
//! # Modules
//!
//! - [`error`] -- Registry errors and their status codes
//! - [`traits`] -- The [`TreeRegistry`] trait
//! - [`memory`] -- In-memory [`InMemoryTreeRegistry`]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use memory::{IdSource, InMemoryTreeRegistry};
pub use traits::{TreeRegistry, TreeToken};
