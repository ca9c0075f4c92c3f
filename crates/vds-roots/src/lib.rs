//! Root commitment log for Verifiable Data Structures.
//!
//! Every tree owns an append-only, gapless sequence of signed roots:
//! [`SignedLogRoot`](vds_types::SignedLogRoot)s for log trees and
//! [`SignedMapRoot`](vds_types::SignedMapRoot)s for map trees. Revisions
//! start at 1 and advance by exactly one per commit. Log sizes never shrink.
//!
//! A commit is all-or-nothing. The next revision is reserved under the
//! tree's commit lock, the canonical bytes are signed (retrying transient
//! signer failures against the same revision), the caller's storage write
//! runs, and only then is the signed root published. Readers see either the
//! previous latest root or the new one, never a root without its signature
//! or its content.
//!
//! Timestamps come from the injected clock. A stalled clock stamps one
//! nanosecond past the previous root; a clock that runs backwards fails the
//! commit with an `Internal` error.
//!
//! # Modules
//!
//! - [`error`] -- Commit and lookup errors
//! - [`traits`] -- The [`RootLog`] trait and commit inputs
//! - [`memory`] -- In-memory [`InMemoryRootLog`]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{RootError, RootResult};
pub use memory::InMemoryRootLog;
pub use traits::{Apply, LogContent, MapContent, RootLog};
