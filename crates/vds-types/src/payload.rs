use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, type-tagged payload.
///
/// Carries open-ended data (private keys, storage settings, map root
/// metadata) as a type identifier plus raw bytes. VDS never interprets the
/// bytes of a payload whose type it does not own; unknown types round-trip
/// through storage verbatim.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnyPayload {
    /// Type identifier, e.g. `"type.vds.dev/vds.Ed25519PrivateKey"`.
    pub type_url: String,
    /// Encoded payload bytes.
    pub value: Vec<u8>,
}

impl AnyPayload {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Returns `true` if the payload carries the given type identifier.
    pub fn is(&self, type_url: &str) -> bool {
        self.type_url == type_url
    }

    /// Returns `true` if both the type identifier and the value are empty.
    pub fn is_empty(&self) -> bool {
        self.type_url.is_empty() && self.value.is_empty()
    }
}

impl fmt::Debug for AnyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyPayload({}, {} bytes)", self.type_url, self.value.len())
    }
}
