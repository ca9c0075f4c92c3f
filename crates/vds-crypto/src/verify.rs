use vds_types::{SignedLogRoot, SignedMapRoot, TreeId};

use crate::signer::verify_signature;

/// Verifies signed roots the way an external auditor would.
///
/// For a sequence of roots from one tree, checks:
/// 1. Every root belongs to the same tree
/// 2. Every signature verifies under the tree's public key
/// 3. Revisions are consecutive
/// 4. Timestamps never go backwards
/// 5. For logs, the tree size never shrinks
pub struct RootVerifier<'a> {
    public_key: &'a [u8],
}

impl<'a> RootVerifier<'a> {
    pub fn new(public_key: &'a [u8]) -> Self {
        Self { public_key }
    }

    /// Verify a single log root's signature.
    pub fn verify_log_root(&self, root: &SignedLogRoot) -> Result<(), VerifyError> {
        let bytes = root
            .unsigned()
            .canonical_bytes()
            .map_err(|e| VerifyError::Encoding(e.to_string()))?;
        verify_signature(self.public_key, &bytes, &root.signature).map_err(|_| {
            VerifyError::BadSignature {
                revision: root.tree_revision,
            }
        })
    }

    /// Verify a single map root's signature.
    pub fn verify_map_root(&self, root: &SignedMapRoot) -> Result<(), VerifyError> {
        let bytes = root
            .unsigned()
            .canonical_bytes()
            .map_err(|e| VerifyError::Encoding(e.to_string()))?;
        verify_signature(self.public_key, &bytes, &root.signature).map_err(|_| {
            VerifyError::BadSignature {
                revision: root.map_revision,
            }
        })
    }

    /// Verify an ordered run of log roots.
    pub fn verify_log_sequence(&self, roots: &[SignedLogRoot]) -> Result<(), VerifyError> {
        let Some(first) = roots.first() else {
            return Ok(());
        };
        self.verify_log_root(first)?;

        for pair in roots.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            check_link(
                first.log_id,
                next.log_id,
                prev.tree_revision,
                next.tree_revision,
            )?;
            if next.tree_size < prev.tree_size {
                return Err(VerifyError::SizeDecreased {
                    revision: next.tree_revision,
                });
            }
            if next.timestamp_nanos < prev.timestamp_nanos {
                return Err(VerifyError::TimestampRegressed {
                    revision: next.tree_revision,
                });
            }
            self.verify_log_root(next)?;
        }
        Ok(())
    }

    /// Verify an ordered run of map roots.
    pub fn verify_map_sequence(&self, roots: &[SignedMapRoot]) -> Result<(), VerifyError> {
        let Some(first) = roots.first() else {
            return Ok(());
        };
        self.verify_map_root(first)?;

        for pair in roots.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            check_link(first.map_id, next.map_id, prev.map_revision, next.map_revision)?;
            if next.timestamp_nanos < prev.timestamp_nanos {
                return Err(VerifyError::TimestampRegressed {
                    revision: next.map_revision,
                });
            }
            self.verify_map_root(next)?;
        }
        Ok(())
    }
}

fn check_link(
    tree: TreeId,
    next_tree: TreeId,
    prev_revision: i64,
    next_revision: i64,
) -> Result<(), VerifyError> {
    if next_tree != tree {
        return Err(VerifyError::MixedTrees {
            expected: tree,
            found: next_tree,
        });
    }
    if next_revision != prev_revision + 1 {
        return Err(VerifyError::RevisionGap {
            expected: prev_revision + 1,
            found: next_revision,
        });
    }
    Ok(())
}

/// Errors from root verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("signature does not verify at revision {revision}")]
    BadSignature { revision: i64 },

    #[error("revision gap: expected {expected}, found {found}")]
    RevisionGap { expected: i64, found: i64 },

    #[error("tree size decreased at revision {revision}")]
    SizeDecreased { revision: i64 },

    #[error("timestamp went backwards at revision {revision}")]
    TimestampRegressed { revision: i64 },

    #[error("root for tree {found} in a sequence for tree {expected}")]
    MixedTrees { expected: TreeId, found: TreeId },

    #[error("encoding error: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use vds_types::{AnyPayload, LogRoot, MapRoot, Timestamp};

    use super::*;
    use crate::signer::{Ed25519Signer, RootSigner, SigningKey};

    fn tree_id() -> TreeId {
        TreeId::new(11).unwrap()
    }

    fn build_log(signer: &Ed25519Signer, sizes: &[i64]) -> Vec<SignedLogRoot> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let root = LogRoot {
                    log_id: tree_id(),
                    tree_revision: i as i64 + 1,
                    tree_size: *size,
                    root_hash: vec![i as u8; 32],
                    timestamp_nanos: Timestamp::from_nanos(1_000 + i as i64),
                };
                let sig = signer.sign(&root.canonical_bytes().unwrap()).unwrap();
                root.into_signed(sig)
            })
            .collect()
    }

    #[test]
    fn empty_sequence_is_valid() {
        let pk = SigningKey::generate().verifying_key().as_bytes();
        assert!(RootVerifier::new(&pk).verify_log_sequence(&[]).is_ok());
    }

    #[test]
    fn valid_log_sequence() {
        let signer = Ed25519Signer::new(SigningKey::generate());
        let pk = signer.verifying_key().as_bytes();
        let roots = build_log(&signer, &[3, 5, 5, 9]);
        assert!(RootVerifier::new(&pk).verify_log_sequence(&roots).is_ok());
    }

    #[test]
    fn shrinking_log_detected() {
        let signer = Ed25519Signer::new(SigningKey::generate());
        let pk = signer.verifying_key().as_bytes();
        let roots = build_log(&signer, &[3, 5, 4]);
        assert_eq!(
            RootVerifier::new(&pk).verify_log_sequence(&roots),
            Err(VerifyError::SizeDecreased { revision: 3 })
        );
    }

    #[test]
    fn revision_gap_detected() {
        let signer = Ed25519Signer::new(SigningKey::generate());
        let pk = signer.verifying_key().as_bytes();
        let mut roots = build_log(&signer, &[1, 2, 3]);
        roots.remove(1);
        assert_eq!(
            RootVerifier::new(&pk).verify_log_sequence(&roots),
            Err(VerifyError::RevisionGap { expected: 2, found: 3 })
        );
    }

    #[test]
    fn tampered_root_detected() {
        let signer = Ed25519Signer::new(SigningKey::generate());
        let pk = signer.verifying_key().as_bytes();
        let mut roots = build_log(&signer, &[1, 2]);
        roots[1].root_hash = vec![0xff; 32];
        assert_eq!(
            RootVerifier::new(&pk).verify_log_sequence(&roots),
            Err(VerifyError::BadSignature { revision: 2 })
        );
    }

    #[test]
    fn wrong_key_detected() {
        let signer = Ed25519Signer::new(SigningKey::generate());
        let other = SigningKey::generate().verifying_key().as_bytes();
        let roots = build_log(&signer, &[1]);
        assert!(RootVerifier::new(&other).verify_log_sequence(&roots).is_err());
    }

    #[test]
    fn map_metadata_is_covered_by_signature() {
        let signer = Ed25519Signer::new(SigningKey::generate());
        let pk = signer.verifying_key().as_bytes();
        let root = MapRoot {
            map_id: tree_id(),
            map_revision: 1,
            root_hash: vec![7; 32],
            timestamp_nanos: Timestamp::from_nanos(5),
            metadata: Some(AnyPayload::new("t", b"{\"epoch\":1}".to_vec())),
        };
        let sig = signer.sign(&root.canonical_bytes().unwrap()).unwrap();
        let mut signed = root.into_signed(sig);
        let verifier = RootVerifier::new(&pk);
        assert!(verifier.verify_map_sequence(std::slice::from_ref(&signed)).is_ok());

        signed.metadata = Some(AnyPayload::new("t", b"{\"epoch\":2}".to_vec()));
        assert_eq!(
            verifier.verify_map_root(&signed),
            Err(VerifyError::BadSignature { revision: 1 })
        );
    }
}
