use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::payload::AnyPayload;
use crate::temporal::Timestamp;

/// Globally unique tree identifier.
///
/// Always strictly positive. Assigned once at creation and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(i64);

impl TreeId {
    /// Create from a raw value. Returns an error for non-positive ids.
    pub fn new(id: i64) -> Result<Self, TypeError> {
        if id <= 0 {
            return Err(TypeError::InvalidTreeId(id.to_string()));
        }
        Ok(Self(id))
    }

    /// Generate a random positive id.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(1..=i64::MAX))
    }

    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeId({})", self.0)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TreeId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: i64 = s
            .trim()
            .parse()
            .map_err(|_| TypeError::InvalidTreeId(s.to_string()))?;
        Self::new(id)
    }
}

/// Kind of verifiable data structure a tree holds.
///
/// Fixes which root variant ([`SignedLogRoot`](crate::SignedLogRoot) or
/// [`SignedMapRoot`](crate::SignedMapRoot)) the tree commits with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeType {
    Log,
    Map,
}

/// Operational state of a tree.
///
/// Deletion is not a state: it is tracked by the `deleted`/`delete_time`
/// fields of [`Tree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeState {
    /// Reads and writes accepted.
    Active,
    /// Reads only.
    Frozen,
}

/// Hash function family used to build a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashStrategy {
    /// Placeholder for an unset strategy. Never valid.
    UnknownHashStrategy,
    /// RFC 6962 log hashing over SHA-256.
    Rfc6962Sha256,
    /// Sparse map hashing over SHA-256, with RFC 6962 domain prefixes.
    TestMapHasher,
    /// Sparse map hashing over SHA-512/256.
    ConiksSha512_256,
}

impl HashStrategy {
    /// Returns `true` if this strategy can build a tree of the given type.
    pub fn supports(&self, tree_type: TreeType) -> bool {
        matches!(
            (self, tree_type),
            (Self::Rfc6962Sha256, TreeType::Log)
                | (Self::TestMapHasher, TreeType::Map)
                | (Self::ConiksSha512_256, TreeType::Map)
        )
    }
}

/// Signature algorithm a tree's roots are signed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureCipherSuite {
    UnknownCipherSuite,
    Ed25519,
    EcdsaP256Sha256,
    RsaPkcs1Sha256,
}

macro_rules! enum_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Canonical upper-case name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(TypeError::UnknownValue(other.to_string())),
                }
            }
        }
    };
}

enum_names!(TreeType { Log => "LOG", Map => "MAP" });
enum_names!(TreeState { Active => "ACTIVE", Frozen => "FROZEN" });
enum_names!(HashStrategy {
    UnknownHashStrategy => "UNKNOWN_HASH_STRATEGY",
    Rfc6962Sha256 => "RFC6962_SHA256",
    TestMapHasher => "TEST_MAP_HASHER",
    ConiksSha512_256 => "CONIKS_SHA512_256",
});
enum_names!(SignatureCipherSuite {
    UnknownCipherSuite => "UNKNOWN_CIPHER_SUITE",
    Ed25519 => "ED25519",
    EcdsaP256Sha256 => "ECDSA_P256_SHA256",
    RsaPkcs1Sha256 => "RSA_PKCS1_SHA256",
});

/// A verifiable log or map, as stored by the tree registry.
///
/// The private key is never part of this struct: it is accepted on create
/// and update but no read returns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub tree_id: TreeId,
    pub tree_type: TreeType,
    pub hash_strategy: HashStrategy,
    pub tree_state: TreeState,
    pub signature_cipher_suite: SignatureCipherSuite,
    pub public_key: Vec<u8>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub storage_settings: Option<AnyPayload>,
    /// Zero disables idle roots.
    pub max_root_duration: Duration,
    pub create_time: Timestamp,
    pub update_time: Timestamp,
    pub deleted: bool,
    pub delete_time: Option<Timestamp>,
}

impl Tree {
    /// Returns `true` if write-path operations may target this tree.
    pub fn accepts_writes(&self) -> bool {
        self.tree_state == TreeState::Active && !self.deleted
    }

    /// Idle root interval, if enabled.
    pub fn idle_interval(&self) -> Option<Duration> {
        (!self.max_root_duration.is_zero()).then_some(self.max_root_duration)
    }
}

/// Input to tree creation.
///
/// Unset fields are `None`; the registry rejects a spec whose required
/// fields are missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub tree_type: Option<TreeType>,
    pub hash_strategy: Option<HashStrategy>,
    pub signature_cipher_suite: Option<SignatureCipherSuite>,
    pub public_key: Option<Vec<u8>>,
    pub private_key: Option<AnyPayload>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub storage_settings: Option<AnyPayload>,
    pub max_root_duration: Duration,
}

/// Patch applied by a tree update.
///
/// Only the mutable fields may be set. The readonly fields exist so that a
/// caller's attempt to change them is visible and can be rejected rather
/// than silently dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeUpdate {
    pub tree_state: Option<TreeState>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub storage_settings: Option<AnyPayload>,
    pub private_key: Option<AnyPayload>,
    pub max_root_duration: Option<Duration>,

    pub tree_id: Option<TreeId>,
    pub tree_type: Option<TreeType>,
    pub hash_strategy: Option<HashStrategy>,
    pub signature_cipher_suite: Option<SignatureCipherSuite>,
    pub public_key: Option<Vec<u8>>,
    pub create_time: Option<Timestamp>,
}

impl TreeUpdate {
    pub fn state(mut self, state: TreeState) -> Self {
        self.tree_state = Some(state);
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn storage_settings(mut self, settings: AnyPayload) -> Self {
        self.storage_settings = Some(settings);
        self
    }

    pub fn private_key(mut self, key: AnyPayload) -> Self {
        self.private_key = Some(key);
        self
    }

    pub fn max_root_duration(mut self, duration: Duration) -> Self {
        self.max_root_duration = Some(duration);
        self
    }

    /// Names of readonly fields this patch attempts to set.
    pub fn readonly_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.tree_id.is_some() {
            fields.push("tree_id");
        }
        if self.tree_type.is_some() {
            fields.push("tree_type");
        }
        if self.hash_strategy.is_some() {
            fields.push("hash_strategy");
        }
        if self.signature_cipher_suite.is_some() {
            fields.push("signature_cipher_suite");
        }
        if self.public_key.is_some() {
            fields.push("public_key");
        }
        if self.create_time.is_some() {
            fields.push("create_time");
        }
        fields
    }

    /// Returns `true` if the patch sets no field at all.
    pub fn is_empty(&self) -> bool {
        self.tree_state.is_none()
            && self.display_name.is_none()
            && self.description.is_none()
            && self.storage_settings.is_none()
            && self.private_key.is_none()
            && self.max_root_duration.is_none()
            && self.readonly_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_id_rejects_non_positive() {
        assert!(TreeId::new(0).is_err());
        assert!(TreeId::new(-5).is_err());
        assert_eq!(TreeId::new(42).unwrap().as_i64(), 42);
    }

    #[test]
    fn random_tree_ids_are_positive_and_distinct() {
        let a = TreeId::random();
        let b = TreeId::random();
        assert!(a.as_i64() > 0);
        assert_ne!(a, b);
    }

    #[test]
    fn tree_id_parse() {
        assert_eq!("17".parse::<TreeId>().unwrap(), TreeId::new(17).unwrap());
        assert!("abc".parse::<TreeId>().is_err());
        assert!("-1".parse::<TreeId>().is_err());
    }

    #[test]
    fn strategy_compatibility() {
        assert!(HashStrategy::Rfc6962Sha256.supports(TreeType::Log));
        assert!(!HashStrategy::Rfc6962Sha256.supports(TreeType::Map));
        assert!(HashStrategy::TestMapHasher.supports(TreeType::Map));
        assert!(HashStrategy::ConiksSha512_256.supports(TreeType::Map));
        assert!(!HashStrategy::UnknownHashStrategy.supports(TreeType::Log));
        assert!(!HashStrategy::UnknownHashStrategy.supports(TreeType::Map));
    }

    #[test]
    fn enum_names_roundtrip() {
        for s in [HashStrategy::Rfc6962Sha256, HashStrategy::ConiksSha512_256] {
            assert_eq!(s.as_str().parse::<HashStrategy>().unwrap(), s);
        }
        assert_eq!("log".parse::<TreeType>().unwrap(), TreeType::Log);
        assert_eq!("ed25519".parse::<SignatureCipherSuite>().unwrap(), SignatureCipherSuite::Ed25519);
    }

    #[test]
    fn legacy_delete_states_do_not_parse() {
        assert!("DEPRECATED_SOFT_DELETED".parse::<TreeState>().is_err());
        assert!("DEPRECATED_HARD_DELETED".parse::<TreeState>().is_err());
        assert!(serde_json::from_str::<TreeState>("\"DEPRECATED_SOFT_DELETED\"").is_err());
    }

    #[test]
    fn serde_uses_screaming_names() {
        let json = serde_json::to_string(&HashStrategy::Rfc6962Sha256).unwrap();
        assert_eq!(json, "\"RFC6962_SHA256\"");
        let json = serde_json::to_string(&TreeState::Frozen).unwrap();
        assert_eq!(json, "\"FROZEN\"");
    }

    #[test]
    fn update_reports_readonly_fields() {
        let mut update = TreeUpdate::default().display_name("x");
        assert!(update.readonly_fields().is_empty());
        update.public_key = Some(vec![1]);
        update.tree_type = Some(TreeType::Map);
        assert_eq!(update.readonly_fields(), vec!["tree_type", "public_key"]);
        assert!(!update.is_empty());
        assert!(TreeUpdate::default().is_empty());
    }

    #[test]
    fn write_admission_follows_state_and_deletion() {
        let mut tree = Tree {
            tree_id: TreeId::new(1).unwrap(),
            tree_type: TreeType::Log,
            hash_strategy: HashStrategy::Rfc6962Sha256,
            tree_state: TreeState::Active,
            signature_cipher_suite: SignatureCipherSuite::Ed25519,
            public_key: vec![0; 32],
            display_name: None,
            description: None,
            storage_settings: None,
            max_root_duration: Duration::ZERO,
            create_time: Timestamp::zero(),
            update_time: Timestamp::zero(),
            deleted: false,
            delete_time: None,
        };
        assert!(tree.accepts_writes());
        assert_eq!(tree.idle_interval(), None);
        tree.tree_state = TreeState::Frozen;
        assert!(!tree.accepts_writes());
        tree.tree_state = TreeState::Active;
        tree.deleted = true;
        assert!(!tree.accepts_writes());
        tree.max_root_duration = Duration::from_secs(3);
        assert_eq!(tree.idle_interval(), Some(Duration::from_secs(3)));
    }
}
