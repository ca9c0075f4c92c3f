use thiserror::Error;
use vds_crypto::CryptoError;
use vds_registry::RegistryError;
use vds_roots::RootError;
use vds_storage::StorageError;
use vds_types::Code;

/// Errors from tree service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Root(#[from] RootError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Service state disagrees with itself.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn code(&self) -> Code {
        match self {
            Self::Registry(e) => e.code(),
            Self::Storage(e) => e.code(),
            Self::Root(e) => e.code(),
            Self::Crypto(e) => e.code(),
            Self::InvalidArgument(_) | Self::Config(_) => Code::InvalidArgument,
            Self::Internal(_) | Self::Io(_) => Code::Internal,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
