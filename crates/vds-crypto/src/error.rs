use thiserror::Error;
use vds_types::{Code, HashStrategy, SignatureCipherSuite};

/// Errors from hashing, key handling, and signature checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("hash strategy {0} is not usable")]
    UnknownHashStrategy(HashStrategy),

    #[error("unsupported signature cipher suite: {0}")]
    UnsupportedCipherSuite(SignatureCipherSuite),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl CryptoError {
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidSignature | Self::Encoding(_) => Code::Internal,
            _ => Code::InvalidArgument,
        }
    }
}

/// Errors reported by a root signer.
///
/// A signer must fail with one of these rather than return an empty
/// signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The signing backend could not be reached. Retrying may succeed.
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    /// The signing backend rejected the request.
    #[error("signing failed: {0}")]
    Failed(String),
}

impl SignerError {
    pub fn code(&self) -> Code {
        match self {
            Self::Unavailable(_) => Code::Unavailable,
            Self::Failed(_) => Code::Internal,
        }
    }

    /// Returns `true` if the same request may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
