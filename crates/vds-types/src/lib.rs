//! Foundation types for Verifiable Data Structures (VDS).
//!
//! This crate provides the data model shared by every other VDS crate: the
//! [`Tree`] entity and its configuration enums, the signed root variants that
//! commit to a tree's content, opaque payloads, and the timestamp/clock
//! primitives used for lifecycle bookkeeping.
//!
//! # Key Types
//!
//! - [`Tree`]: a log or map tree with immutable identity and key configuration
//! - [`TreeSpec`] / [`TreeUpdate`]: create input and mutable-field patch
//! - [`SignedLogRoot`] / [`SignedMapRoot`]: signed commitments to tree content
//! - [`AnyPayload`]: tagged opaque payload (type URL + bytes)
//! - [`Timestamp`] / [`Clock`]: nanosecond time and injectable clocks
//! - [`Code`]: error classification shared across crates

pub mod error;
pub mod payload;
pub mod root;
pub mod temporal;
pub mod tree;

pub use error::{Code, TypeError};
pub use payload::AnyPayload;
pub use root::{DigitallySigned, LogRoot, MapRoot, SignedLogRoot, SignedMapRoot};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
pub use tree::{
    HashStrategy, SignatureCipherSuite, Tree, TreeId, TreeSpec, TreeState, TreeType, TreeUpdate,
};
