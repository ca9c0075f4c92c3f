use thiserror::Error;
use vds_crypto::{CryptoError, SignerError};
use vds_types::{Code, TreeId, TreeType, TypeError};

/// Errors from committing or reading roots.
#[derive(Debug, Error)]
pub enum RootError {
    /// The tree has no roots yet, or they were purged.
    #[error("no roots for tree {0}")]
    NoRoots(TreeId),

    /// The revision was never issued.
    #[error("tree {tree_id} has no root at revision {revision}")]
    RevisionNotFound { tree_id: TreeId, revision: i64 },

    /// A log operation was requested on a map tree, or the reverse.
    #[error("tree {tree_id} is a {found} tree, expected {expected}")]
    WrongTreeType {
        tree_id: TreeId,
        expected: TreeType,
        found: TreeType,
    },

    /// A new root would break the ordering of the root sequence.
    #[error("monotonicity violation on tree {tree_id}: {reason}")]
    Monotonicity { tree_id: TreeId, reason: String },

    /// The signer returned something that is not a usable signature.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// The commit's content could not be stored. No root was published.
    #[error("applying content to tree {tree_id} failed: {reason}")]
    Apply {
        tree_id: TreeId,
        code: Code,
        reason: String,
    },

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Encoding(#[from] TypeError),

    #[error("root log lock poisoned")]
    Poisoned,
}

impl RootError {
    pub fn code(&self) -> Code {
        match self {
            Self::NoRoots(_) | Self::RevisionNotFound { .. } => Code::NotFound,
            Self::WrongTreeType { .. } => Code::InvalidArgument,
            Self::Monotonicity { .. } | Self::MalformedSignature(_) | Self::Poisoned => {
                Code::Internal
            }
            Self::Apply { code, .. } => *code,
            Self::Signer(e) => e.code(),
            Self::Crypto(e) => e.code(),
            Self::Encoding(e) => e.code(),
        }
    }
}

pub type RootResult<T> = Result<T, RootError>;
