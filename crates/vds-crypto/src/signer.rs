use std::sync::Arc;

use vds_types::{AnyPayload, DigitallySigned, SignatureCipherSuite, Tree};

use crate::error::{CryptoError, SignerError};

/// Payload type of an Ed25519 private key: the raw 32-byte secret.
pub const ED25519_PRIVATE_KEY_TYPE: &str = "type.vds.dev/vds.Ed25519PrivateKey";

/// Produces signatures over canonical root bytes.
///
/// Implementations may call out to slow or unreliable backends (HSM, KMS).
/// They must return an error rather than an empty signature.
pub trait RootSigner: Send + Sync {
    /// The cipher suite this signer produces.
    fn cipher_suite(&self) -> SignatureCipherSuite;

    /// Sign `message`.
    fn sign(&self, message: &[u8]) -> Result<DigitallySigned, SignerError>;
}

/// Builds the signer for a tree from its stored private key.
pub trait SignerFactory: Send + Sync {
    fn signer_for(
        &self,
        tree: &Tree,
        private_key: &AnyPayload,
    ) -> Result<Arc<dyn RootSigner>, CryptoError>;
}

/// Ed25519 signing key (private).
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Decode from a private key payload.
    pub fn from_payload(payload: &AnyPayload) -> Result<Self, CryptoError> {
        if !payload.is(ED25519_PRIVATE_KEY_TYPE) {
            return Err(CryptoError::InvalidKey(format!(
                "expected private key of type {ED25519_PRIVATE_KEY_TYPE}, got {}",
                payload.type_url
            )));
        }
        let bytes: [u8; 32] = payload.value.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected 32-byte Ed25519 secret, got {} bytes",
                payload.value.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Encode as a private key payload.
    pub fn to_payload(&self) -> AnyPayload {
        AnyPayload::new(ED25519_PRIVATE_KEY_TYPE, self.0.to_bytes().to_vec())
    }

    /// The corresponding public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        use ed25519_dalek::Signer;
        self.0.sign(message).to_bytes().to_vec()
    }
}

impl VerifyingKey {
    /// Create from raw 32-byte public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected 32-byte public key, got {} bytes", bytes.len()))
        })?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self(key))
    }

    /// Verify a raw signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        use ed25519_dalek::Verifier;
        let arr: [u8; 64] = signature
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        let sig = ed25519_dalek::Signature::from_bytes(&arr);
        self.0
            .verify(message, &sig)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.0.to_bytes()))
    }
}

/// Check that `public_key` is well-formed for `suite`.
pub fn validate_public_key(suite: SignatureCipherSuite, public_key: &[u8]) -> Result<(), CryptoError> {
    match suite {
        SignatureCipherSuite::Ed25519 => VerifyingKey::from_bytes(public_key).map(|_| ()),
        other => Err(CryptoError::UnsupportedCipherSuite(other)),
    }
}

/// Derive the public key bytes for a private key payload under `suite`.
pub fn public_key_for(
    suite: SignatureCipherSuite,
    private_key: &AnyPayload,
) -> Result<Vec<u8>, CryptoError> {
    match suite {
        SignatureCipherSuite::Ed25519 => {
            let key = SigningKey::from_payload(private_key)?;
            Ok(key.verifying_key().as_bytes().to_vec())
        }
        other => Err(CryptoError::UnsupportedCipherSuite(other)),
    }
}

/// Verify a root signature against a tree's public key.
pub fn verify_signature(
    public_key: &[u8],
    message: &[u8],
    signature: &DigitallySigned,
) -> Result<(), CryptoError> {
    match signature.cipher_suite {
        SignatureCipherSuite::Ed25519 => {
            VerifyingKey::from_bytes(public_key)?.verify(message, &signature.signature)
        }
        other => Err(CryptoError::UnsupportedCipherSuite(other)),
    }
}

/// In-process Ed25519 root signer.
#[derive(Debug)]
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl RootSigner for Ed25519Signer {
    fn cipher_suite(&self) -> SignatureCipherSuite {
        SignatureCipherSuite::Ed25519
    }

    fn sign(&self, message: &[u8]) -> Result<DigitallySigned, SignerError> {
        Ok(DigitallySigned {
            cipher_suite: SignatureCipherSuite::Ed25519,
            signature: self.key.sign(message),
        })
    }
}

/// Builds [`Ed25519Signer`]s from stored private key payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519SignerFactory;

impl SignerFactory for Ed25519SignerFactory {
    fn signer_for(
        &self,
        tree: &Tree,
        private_key: &AnyPayload,
    ) -> Result<Arc<dyn RootSigner>, CryptoError> {
        if tree.signature_cipher_suite != SignatureCipherSuite::Ed25519 {
            return Err(CryptoError::UnsupportedCipherSuite(tree.signature_cipher_suite));
        }
        let key = SigningKey::from_payload(private_key)?;
        if key.verifying_key().as_bytes().as_slice() != tree.public_key.as_slice() {
            return Err(CryptoError::InvalidKey(
                "private key does not match the tree's public key".into(),
            ));
        }
        Ok(Arc::new(Ed25519Signer::new(key)))
    }
}
