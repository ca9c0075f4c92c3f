use sha2::{Digest, Sha256, Sha512_256};
use vds_types::HashStrategy;

use crate::error::CryptoError;

/// Domain-separation byte prepended to leaf data before hashing.
pub const LEAF_PREFIX: u8 = 0x00;
/// Domain-separation byte prepended to a pair of child hashes before hashing.
pub const NODE_PREFIX: u8 = 0x01;

/// Hash function family used by a tree.
///
/// Leaf and node hashes are domain separated so that a leaf can never be
/// confused with an internal node of the same bytes.
pub trait TreeHasher: Send + Sync {
    /// The strategy this hasher implements.
    fn strategy(&self) -> HashStrategy;

    /// Digest length in bytes.
    fn size(&self) -> usize;

    /// Hash of an empty tree.
    fn empty_hash(&self) -> Vec<u8>;

    /// Hash of leaf data: `H(0x00 || data)`.
    fn leaf_hash(&self, data: &[u8]) -> Vec<u8>;

    /// Hash of an internal node: `H(0x01 || left || right)`.
    fn node_hash(&self, left: &[u8], right: &[u8]) -> Vec<u8>;

    /// 256-bit sparse tree index of a map key: `H(key)`.
    fn key_index(&self, key: &[u8]) -> [u8; 32];
}

#[derive(Clone, Copy, Debug)]
enum DigestKind {
    Sha256,
    Sha512_256,
}

/// A [`TreeHasher`] built from a digest and the leaf/node prefixes.
#[derive(Debug)]
pub struct PrefixHasher {
    strategy: HashStrategy,
    digest: DigestKind,
}

impl PrefixHasher {
    fn digest(&self, parts: &[&[u8]]) -> Vec<u8> {
        match self.digest {
            DigestKind::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            DigestKind::Sha512_256 => {
                let mut hasher = Sha512_256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
        }
    }
}

impl TreeHasher for PrefixHasher {
    fn strategy(&self) -> HashStrategy {
        self.strategy
    }

    fn size(&self) -> usize {
        32
    }

    fn empty_hash(&self) -> Vec<u8> {
        self.digest(&[])
    }

    fn leaf_hash(&self, data: &[u8]) -> Vec<u8> {
        self.digest(&[&[LEAF_PREFIX], data])
    }

    fn node_hash(&self, left: &[u8], right: &[u8]) -> Vec<u8> {
        self.digest(&[&[NODE_PREFIX], left, right])
    }

    fn key_index(&self, key: &[u8]) -> [u8; 32] {
        let mut index = [0u8; 32];
        // Both digests are 32 bytes.
        index.copy_from_slice(&self.digest(&[key]));
        index
    }
}

static RFC6962_SHA256: PrefixHasher = PrefixHasher {
    strategy: HashStrategy::Rfc6962Sha256,
    digest: DigestKind::Sha256,
};

static TEST_MAP_HASHER: PrefixHasher = PrefixHasher {
    strategy: HashStrategy::TestMapHasher,
    digest: DigestKind::Sha256,
};

static CONIKS_SHA512_256: PrefixHasher = PrefixHasher {
    strategy: HashStrategy::ConiksSha512_256,
    digest: DigestKind::Sha512_256,
};

/// Look up the hasher for a strategy.
///
/// `UnknownHashStrategy` never resolves.
pub fn hasher_for(strategy: HashStrategy) -> Result<&'static dyn TreeHasher, CryptoError> {
    match strategy {
        HashStrategy::Rfc6962Sha256 => Ok(&RFC6962_SHA256),
        HashStrategy::TestMapHasher => Ok(&TEST_MAP_HASHER),
        HashStrategy::ConiksSha512_256 => Ok(&CONIKS_SHA512_256),
        HashStrategy::UnknownHashStrategy => Err(CryptoError::UnknownHashStrategy(strategy)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc() -> &'static dyn TreeHasher {
        hasher_for(HashStrategy::Rfc6962Sha256).unwrap()
    }

    #[test]
    fn unknown_strategy_fails_closed() {
        let err = hasher_for(HashStrategy::UnknownHashStrategy).err().unwrap();
        assert_eq!(err.code(), vds_types::Code::InvalidArgument);
    }

    #[test]
    fn empty_hash_is_sha256_of_nothing() {
        assert_eq!(
            hex::encode(rfc().empty_hash()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn rfc6962_empty_leaf_vector() {
        assert_eq!(
            hex::encode(rfc().leaf_hash(b"")),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[test]
    fn leaf_and_node_are_domain_separated() {
        let h = rfc();
        let left = vec![1u8; 32];
        let right = vec![2u8; 32];
        let mut joined = left.clone();
        joined.extend_from_slice(&right);
        assert_ne!(h.leaf_hash(&joined), h.node_hash(&left, &right));
    }

    #[test]
    fn leaf_hash_uses_leaf_prefix() {
        let h = rfc();
        let mut manual = Sha256::new();
        manual.update([LEAF_PREFIX]);
        manual.update(b"data");
        assert_eq!(h.leaf_hash(b"data"), manual.finalize().to_vec());
    }

    #[test]
    fn strategies_report_themselves() {
        for s in [
            HashStrategy::Rfc6962Sha256,
            HashStrategy::TestMapHasher,
            HashStrategy::ConiksSha512_256,
        ] {
            let h = hasher_for(s).unwrap();
            assert_eq!(h.strategy(), s);
            assert_eq!(h.empty_hash().len(), h.size());
            assert_eq!(h.leaf_hash(b"x").len(), h.size());
        }
    }

    #[test]
    fn key_index_follows_the_strategy_digest() {
        let test_map = hasher_for(HashStrategy::TestMapHasher).unwrap();
        let coniks = hasher_for(HashStrategy::ConiksSha512_256).unwrap();
        let sha256: [u8; 32] = Sha256::digest(b"alice").into();
        let sha512_256: [u8; 32] = Sha512_256::digest(b"alice").into();
        assert_eq!(test_map.key_index(b"alice"), sha256);
        assert_eq!(coniks.key_index(b"alice"), sha512_256);
    }

    #[test]
    fn different_digests_differ() {
        let a = hasher_for(HashStrategy::TestMapHasher).unwrap();
        let b = hasher_for(HashStrategy::ConiksSha512_256).unwrap();
        assert_ne!(a.leaf_hash(b"same"), b.leaf_hash(b"same"));
    }
}
