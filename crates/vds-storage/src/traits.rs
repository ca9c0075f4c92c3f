use vds_types::{Tree, TreeId};

use crate::error::StorageResult;

/// Content summary of a log tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHead {
    pub tree_size: u64,
    pub root_hash: Vec<u8>,
}

/// A batch of leaves whose prospective head has been computed but which
/// has not been stored yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingLogAppend {
    pub tree_id: TreeId,
    /// Tree size the batch was prepared against.
    pub base_size: u64,
    pub leaves: Vec<Vec<u8>>,
    /// Head after the batch is applied.
    pub head: LogHead,
}

/// Set or remove one map entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapUpdate {
    pub key: Vec<u8>,
    /// `None` removes the entry.
    pub value: Option<Vec<u8>>,
}

impl MapUpdate {
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// A set of map updates whose prospective root has been computed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMapUpdate {
    pub tree_id: TreeId,
    /// Storage version the updates were prepared against.
    pub base_version: u64,
    pub updates: Vec<MapUpdate>,
    /// Root after the updates are applied.
    pub root_hash: Vec<u8>,
}

/// Storage engine for log trees.
///
/// Implementations must be thread-safe and keep trees independent: work
/// on one tree never blocks on another tree's writes for longer than a
/// bookkeeping critical section.
pub trait LogStorage: Send + Sync {
    /// Create empty storage for a new log tree.
    fn init_tree(&self, tree: &Tree) -> StorageResult<()>;

    /// Current entry count and root hash.
    fn head(&self, tree_id: TreeId) -> StorageResult<LogHead>;

    /// Compute the head that appending `leaves` would produce.
    fn prepare_append(&self, tree_id: TreeId, leaves: Vec<Vec<u8>>)
        -> StorageResult<PendingLogAppend>;

    /// Store a prepared batch. Fails if the tree changed since preparation.
    fn apply_append(&self, pending: PendingLogAppend) -> StorageResult<LogHead>;

    /// Leaf data at `index`, if present.
    fn leaf(&self, tree_id: TreeId, index: u64) -> StorageResult<Option<Vec<u8>>>;

    /// Permanently drop all data for the tree. Returns `true` if it existed.
    fn purge(&self, tree_id: TreeId) -> StorageResult<bool>;
}

/// Storage engine for map trees.
pub trait MapStorage: Send + Sync {
    /// Create empty storage for a new map tree.
    fn init_tree(&self, tree: &Tree) -> StorageResult<()>;

    /// Current root hash.
    fn root_hash(&self, tree_id: TreeId) -> StorageResult<Vec<u8>>;

    /// Compute the root that applying `updates` would produce.
    fn prepare_update(&self, tree_id: TreeId, updates: Vec<MapUpdate>)
        -> StorageResult<PendingMapUpdate>;

    /// Store prepared updates. Fails if the tree changed since preparation.
    fn apply_update(&self, pending: PendingMapUpdate) -> StorageResult<Vec<u8>>;

    /// Value stored under `key`, if any.
    fn get(&self, tree_id: TreeId, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Permanently drop all data for the tree. Returns `true` if it existed.
    fn purge(&self, tree_id: TreeId) -> StorageResult<bool>;
}
