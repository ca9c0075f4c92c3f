//! Tree service for Verifiable Data Structures.
//!
//! [`TreeService`] wires the tree registry, the storage engines, the root
//! commitment log, and the signer factory into the data flow of a write:
//!
//! 1. take the tree's exclusive token
//! 2. admit the write (tree ACTIVE and not deleted)
//! 3. ask storage for the prospective root of the batch
//! 4. sign the next root
//! 5. apply the batch to storage and publish the root
//!
//! Step 5 runs inside the root log's commit, so the root becomes visible
//! only once storage holds its content. A failed signature leaves storage
//! untouched; a failed apply leaves the previous root as the latest.
//!
//! [`Sequencer`] runs the time-driven work in the background: idle roots
//! for trees with a `max_root_duration`, and permanent removal of trees
//! whose retention window expired.
//!
//! # Modules
//!
//! - [`config`] -- [`ServiceConfig`] loaded from TOML
//! - [`error`] -- [`ServiceError`]
//! - [`service`] -- [`TreeService`]
//! - [`sequencer`] -- Background [`Sequencer`]

pub mod config;
pub mod error;
pub mod sequencer;
pub mod service;

pub use config::{SequencerConfig, ServiceConfig, SigningConfig};
pub use error::{ServiceError, ServiceResult};
pub use sequencer::{Sequencer, SequencerPass};
pub use service::TreeService;
