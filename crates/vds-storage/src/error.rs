use vds_crypto::CryptoError;
use vds_types::{Code, TreeId};

/// Errors from storage engine operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No storage has been initialized for the tree.
    #[error("no storage for tree {0}")]
    TreeNotFound(TreeId),

    /// Storage for the tree was already initialized.
    #[error("storage for tree {0} already exists")]
    TreeExists(TreeId),

    /// A prepared write no longer matches the stored state.
    #[error("conflicting write to tree {tree_id}: {reason}")]
    Conflict { tree_id: TreeId, reason: String },

    /// The tree's hash strategy or keys are unusable.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A lock guarding storage state was poisoned.
    #[error("storage lock poisoned")]
    Poisoned,
}

impl StorageError {
    pub fn code(&self) -> Code {
        match self {
            Self::TreeNotFound(_) => Code::NotFound,
            Self::TreeExists(_) => Code::AlreadyExists,
            Self::Conflict { .. } | Self::Poisoned => Code::Internal,
            Self::Crypto(e) => e.code(),
        }
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
