//! Cryptographic primitives for Verifiable Data Structures.
//!
//! Provides the hash strategy registry (leaf/node/empty hash families with
//! domain separation), RFC 6962 log roots and sparse map roots, Ed25519 root
//! signing, and verification of signed root sequences.
//!
//! Signing and hashing are delegated to `ed25519-dalek` and `sha2`.

pub mod error;
pub mod hasher;
pub mod merkle;
pub mod signer;
pub mod verify;

pub use error::{CryptoError, SignerError};
pub use hasher::{hasher_for, TreeHasher, LEAF_PREFIX, NODE_PREFIX};
pub use merkle::{MerkleTree, SparseMerkleTree};
pub use signer::{
    public_key_for, validate_public_key, verify_signature, Ed25519Signer, Ed25519SignerFactory,
    RootSigner, SignerFactory, SigningKey, VerifyingKey, ED25519_PRIVATE_KEY_TYPE,
};
pub use verify::{RootVerifier, VerifyError};
