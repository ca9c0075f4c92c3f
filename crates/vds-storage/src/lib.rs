//! Tree storage engine interface for Verifiable Data Structures.
//!
//! The root commitment log never reads leaves itself: at commit time it asks
//! the storage engine for the tree's current content summary (entry count
//! and root hash for a log, root hash for a map). This crate defines that
//! boundary and ships an in-memory engine.
//!
//! # Two-phase writes
//!
//! Writes are split into `prepare_*` (compute the prospective root without
//! mutating anything) and `apply_*` (make the prepared change visible). The
//! caller signs the prospective root between the two, so a failed signature
//! leaves storage untouched.
//!
//! # Backends
//!
//! - [`InMemoryLogStorage`] -- leaves held in memory with a compact Merkle range
//! - [`InMemoryMapStorage`] -- entries held in memory with a sparse Merkle root

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryLogStorage, InMemoryMapStorage};
pub use traits::{LogHead, LogStorage, MapStorage, MapUpdate, PendingLogAppend, PendingMapUpdate};
