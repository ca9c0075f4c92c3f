use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure, shared by every VDS error type.
///
/// Each crate keeps its own error enum and maps its variants onto one of
/// these codes so callers can branch on the class of failure without
/// matching crate-specific variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    /// Malformed, missing, or readonly-violating input.
    InvalidArgument,
    /// Unknown tree or revision.
    NotFound,
    /// Operation not legal in the tree's current state.
    FailedPrecondition,
    /// Identifier collision.
    AlreadyExists,
    /// Internal consistency fault.
    Internal,
    /// A collaborator (e.g. the signer) is temporarily unavailable.
    Unavailable,
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
        };
        f.write_str(name)
    }
}

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid tree id: {0}")]
    InvalidTreeId(String),

    #[error("unknown enum value: {0}")]
    UnknownValue(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TypeError {
    pub fn code(&self) -> Code {
        match self {
            Self::Serialization(_) => Code::Internal,
            _ => Code::InvalidArgument,
        }
    }
}
