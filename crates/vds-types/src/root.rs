//! Signed root commitments.
//!
//! A root is signed over its canonical encoding: the bincode serialization
//! (fixed-width little-endian integers, `u64` length prefixes) of every field
//! except the signature, in declaration order, preceded by a domain tag.
//! This encoding is part of the wire contract and must not change for a
//! given domain tag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::payload::AnyPayload;
use crate::temporal::Timestamp;
use crate::tree::{SignatureCipherSuite, TreeId};

const LOG_ROOT_DOMAIN: &str = "vds-log-root-v1";
const MAP_ROOT_DOMAIN: &str = "vds-map-root-v1";

/// A signature together with the algorithm that produced it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitallySigned {
    pub cipher_suite: SignatureCipherSuite,
    pub signature: Vec<u8>,
}

impl fmt::Debug for DigitallySigned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.signature[..self.signature.len().min(8)];
        write!(f, "DigitallySigned({}, {}...)", self.cipher_suite, hex::encode(prefix))
    }
}

/// Unsigned content of a log root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRoot {
    pub log_id: TreeId,
    pub tree_revision: i64,
    pub tree_size: i64,
    pub root_hash: Vec<u8>,
    pub timestamp_nanos: Timestamp,
}

/// Unsigned content of a map root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRoot {
    pub map_id: TreeId,
    pub map_revision: i64,
    pub root_hash: Vec<u8>,
    pub timestamp_nanos: Timestamp,
    pub metadata: Option<AnyPayload>,
}

#[derive(Serialize)]
struct CanonicalLogRoot<'a> {
    domain: &'static str,
    log_id: i64,
    tree_revision: i64,
    tree_size: i64,
    root_hash: &'a [u8],
    timestamp_nanos: i64,
}

#[derive(Serialize)]
struct CanonicalMapRoot<'a> {
    domain: &'static str,
    map_id: i64,
    map_revision: i64,
    root_hash: &'a [u8],
    timestamp_nanos: i64,
    metadata: Option<(&'a str, &'a [u8])>,
}

impl LogRoot {
    /// Canonical bytes handed to the signer.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TypeError> {
        let canonical = CanonicalLogRoot {
            domain: LOG_ROOT_DOMAIN,
            log_id: self.log_id.as_i64(),
            tree_revision: self.tree_revision,
            tree_size: self.tree_size,
            root_hash: &self.root_hash,
            timestamp_nanos: self.timestamp_nanos.as_nanos(),
        };
        bincode::serialize(&canonical).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn into_signed(self, signature: DigitallySigned) -> SignedLogRoot {
        SignedLogRoot {
            log_id: self.log_id,
            tree_revision: self.tree_revision,
            tree_size: self.tree_size,
            root_hash: self.root_hash,
            timestamp_nanos: self.timestamp_nanos,
            signature,
        }
    }
}

impl MapRoot {
    /// Canonical bytes handed to the signer.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TypeError> {
        let canonical = CanonicalMapRoot {
            domain: MAP_ROOT_DOMAIN,
            map_id: self.map_id.as_i64(),
            map_revision: self.map_revision,
            root_hash: &self.root_hash,
            timestamp_nanos: self.timestamp_nanos.as_nanos(),
            metadata: self
                .metadata
                .as_ref()
                .map(|m| (m.type_url.as_str(), m.value.as_slice())),
        };
        bincode::serialize(&canonical).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn into_signed(self, signature: DigitallySigned) -> SignedMapRoot {
        SignedMapRoot {
            map_id: self.map_id,
            map_revision: self.map_revision,
            root_hash: self.root_hash,
            timestamp_nanos: self.timestamp_nanos,
            signature,
            metadata: self.metadata,
        }
    }
}

/// Signed commitment to a log tree at one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLogRoot {
    pub log_id: TreeId,
    pub tree_revision: i64,
    pub tree_size: i64,
    pub root_hash: Vec<u8>,
    pub timestamp_nanos: Timestamp,
    pub signature: DigitallySigned,
}

impl SignedLogRoot {
    /// The signed content without its signature.
    pub fn unsigned(&self) -> LogRoot {
        LogRoot {
            log_id: self.log_id,
            tree_revision: self.tree_revision,
            tree_size: self.tree_size,
            root_hash: self.root_hash.clone(),
            timestamp_nanos: self.timestamp_nanos,
        }
    }
}

/// Signed commitment to a map tree at one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMapRoot {
    pub map_id: TreeId,
    pub map_revision: i64,
    pub root_hash: Vec<u8>,
    pub timestamp_nanos: Timestamp,
    pub signature: DigitallySigned,
    /// Application-supplied, persisted and returned verbatim.
    pub metadata: Option<AnyPayload>,
}

impl SignedMapRoot {
    /// The signed content without its signature.
    pub fn unsigned(&self) -> MapRoot {
        MapRoot {
            map_id: self.map_id,
            map_revision: self.map_revision,
            root_hash: self.root_hash.clone(),
            timestamp_nanos: self.timestamp_nanos,
            metadata: self.metadata.clone(),
        }
    }
}
