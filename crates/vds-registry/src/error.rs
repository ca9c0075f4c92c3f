use thiserror::Error;
use vds_crypto::CryptoError;
use vds_types::{Code, TreeId};

/// Errors from tree registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Missing or malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An update tried to change a field that is fixed at creation.
    #[error("readonly field cannot be updated: {0}")]
    ReadonlyField(String),

    /// No visible tree has this id.
    #[error("tree not found: {0}")]
    TreeNotFound(TreeId),

    /// Id assignment collided with an existing tree.
    #[error("tree already exists: {0}")]
    AlreadyExists(TreeId),

    /// The tree is not in a state that permits the operation.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Key material or hash strategy is unusable.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A registry lock was poisoned.
    #[error("registry lock poisoned")]
    Poisoned,
}

impl RegistryError {
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) | Self::ReadonlyField(_) => Code::InvalidArgument,
            Self::TreeNotFound(_) => Code::NotFound,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::FailedPrecondition(_) => Code::FailedPrecondition,
            Self::Crypto(e) => e.code(),
            Self::Poisoned => Code::Internal,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
