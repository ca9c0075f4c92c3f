//! In-memory storage engines for tests, demos, and embedding.
//!
//! Each engine keeps per-tree state in a `HashMap` behind a `RwLock`. Root
//! computation for `prepare_*` runs under the read lock, so concurrent
//! readers and preparers on other trees are not blocked.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::debug;
use vds_crypto::{hasher_for, MerkleTree, SparseMerkleTree, TreeHasher};
use vds_types::{Tree, TreeId};

use crate::error::{StorageError, StorageResult};
use crate::traits::{LogHead, LogStorage, MapStorage, MapUpdate, PendingLogAppend, PendingMapUpdate};

struct LogState {
    hasher: &'static dyn TreeHasher,
    leaves: Vec<Vec<u8>>,
    merkle: MerkleTree,
}

impl LogState {
    fn head(&self) -> LogHead {
        LogHead {
            tree_size: self.merkle.leaf_count(),
            root_hash: self.merkle.root(self.hasher),
        }
    }
}

/// In-memory [`LogStorage`].
#[derive(Default)]
pub struct InMemoryLogStorage {
    trees: RwLock<HashMap<TreeId, LogState>>,
}

impl InMemoryLogStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStorage for InMemoryLogStorage {
    fn init_tree(&self, tree: &Tree) -> StorageResult<()> {
        let hasher = hasher_for(tree.hash_strategy)?;
        let mut trees = self.trees.write().map_err(|_| StorageError::Poisoned)?;
        if trees.contains_key(&tree.tree_id) {
            return Err(StorageError::TreeExists(tree.tree_id));
        }
        trees.insert(
            tree.tree_id,
            LogState {
                hasher,
                leaves: Vec::new(),
                merkle: MerkleTree::new(),
            },
        );
        Ok(())
    }

    fn head(&self, tree_id: TreeId) -> StorageResult<LogHead> {
        let trees = self.trees.read().map_err(|_| StorageError::Poisoned)?;
        let state = trees.get(&tree_id).ok_or(StorageError::TreeNotFound(tree_id))?;
        Ok(state.head())
    }

    fn prepare_append(
        &self,
        tree_id: TreeId,
        leaves: Vec<Vec<u8>>,
    ) -> StorageResult<PendingLogAppend> {
        let trees = self.trees.read().map_err(|_| StorageError::Poisoned)?;
        let state = trees.get(&tree_id).ok_or(StorageError::TreeNotFound(tree_id))?;

        let mut prospective = state.merkle.clone();
        for leaf in &leaves {
            prospective.append(state.hasher, state.hasher.leaf_hash(leaf));
        }

        Ok(PendingLogAppend {
            tree_id,
            base_size: state.merkle.leaf_count(),
            leaves,
            head: LogHead {
                tree_size: prospective.leaf_count(),
                root_hash: prospective.root(state.hasher),
            },
        })
    }

    fn apply_append(&self, pending: PendingLogAppend) -> StorageResult<LogHead> {
        let mut trees = self.trees.write().map_err(|_| StorageError::Poisoned)?;
        let state = trees
            .get_mut(&pending.tree_id)
            .ok_or(StorageError::TreeNotFound(pending.tree_id))?;

        if state.merkle.leaf_count() != pending.base_size {
            return Err(StorageError::Conflict {
                tree_id: pending.tree_id,
                reason: format!(
                    "prepared against size {}, tree now has {}",
                    pending.base_size,
                    state.merkle.leaf_count()
                ),
            });
        }

        for leaf in pending.leaves {
            let hash = state.hasher.leaf_hash(&leaf);
            state.merkle.append(state.hasher, hash);
            state.leaves.push(leaf);
        }

        let head = state.head();
        debug!(tree_id = %pending.tree_id, tree_size = head.tree_size, "applied log append");
        Ok(head)
    }

    fn leaf(&self, tree_id: TreeId, index: u64) -> StorageResult<Option<Vec<u8>>> {
        let trees = self.trees.read().map_err(|_| StorageError::Poisoned)?;
        let state = trees.get(&tree_id).ok_or(StorageError::TreeNotFound(tree_id))?;
        let leaf = usize::try_from(index)
            .ok()
            .and_then(|i| state.leaves.get(i))
            .cloned();
        Ok(leaf)
    }

    fn purge(&self, tree_id: TreeId) -> StorageResult<bool> {
        let mut trees = self.trees.write().map_err(|_| StorageError::Poisoned)?;
        Ok(trees.remove(&tree_id).is_some())
    }
}

struct MapState {
    hasher: &'static dyn TreeHasher,
    version: u64,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Key index → leaf hash, the sparse tree's populated leaves.
    leaves: BTreeMap<[u8; 32], Vec<u8>>,
}

impl MapState {
    fn apply_to(
        hasher: &dyn TreeHasher,
        leaves: &mut BTreeMap<[u8; 32], Vec<u8>>,
        update: &MapUpdate,
    ) {
        let index = hasher.key_index(&update.key);
        match &update.value {
            Some(value) => {
                leaves.insert(index, hasher.leaf_hash(value));
            }
            None => {
                leaves.remove(&index);
            }
        }
    }
}

/// In-memory [`MapStorage`].
#[derive(Default)]
pub struct InMemoryMapStorage {
    trees: RwLock<HashMap<TreeId, MapState>>,
}

impl InMemoryMapStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapStorage for InMemoryMapStorage {
    fn init_tree(&self, tree: &Tree) -> StorageResult<()> {
        let hasher = hasher_for(tree.hash_strategy)?;
        let mut trees = self.trees.write().map_err(|_| StorageError::Poisoned)?;
        if trees.contains_key(&tree.tree_id) {
            return Err(StorageError::TreeExists(tree.tree_id));
        }
        trees.insert(
            tree.tree_id,
            MapState {
                hasher,
                version: 0,
                entries: BTreeMap::new(),
                leaves: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn root_hash(&self, tree_id: TreeId) -> StorageResult<Vec<u8>> {
        let trees = self.trees.read().map_err(|_| StorageError::Poisoned)?;
        let state = trees.get(&tree_id).ok_or(StorageError::TreeNotFound(tree_id))?;
        Ok(SparseMerkleTree::new(state.hasher).root(&state.leaves))
    }

    fn prepare_update(
        &self,
        tree_id: TreeId,
        updates: Vec<MapUpdate>,
    ) -> StorageResult<PendingMapUpdate> {
        let trees = self.trees.read().map_err(|_| StorageError::Poisoned)?;
        let state = trees.get(&tree_id).ok_or(StorageError::TreeNotFound(tree_id))?;

        let mut leaves = state.leaves.clone();
        for update in &updates {
            MapState::apply_to(state.hasher, &mut leaves, update);
        }

        Ok(PendingMapUpdate {
            tree_id,
            base_version: state.version,
            updates,
            root_hash: SparseMerkleTree::new(state.hasher).root(&leaves),
        })
    }

    fn apply_update(&self, pending: PendingMapUpdate) -> StorageResult<Vec<u8>> {
        let mut trees = self.trees.write().map_err(|_| StorageError::Poisoned)?;
        let state = trees
            .get_mut(&pending.tree_id)
            .ok_or(StorageError::TreeNotFound(pending.tree_id))?;

        if state.version != pending.base_version {
            return Err(StorageError::Conflict {
                tree_id: pending.tree_id,
                reason: format!(
                    "prepared against version {}, map now at {}",
                    pending.base_version, state.version
                ),
            });
        }

        for update in pending.updates {
            MapState::apply_to(state.hasher, &mut state.leaves, &update);
            match update.value {
                Some(value) => {
                    state.entries.insert(update.key, value);
                }
                None => {
                    state.entries.remove(&update.key);
                }
            }
        }
        state.version += 1;

        debug!(tree_id = %pending.tree_id, version = state.version, "applied map update");
        Ok(pending.root_hash)
    }

    fn get(&self, tree_id: TreeId, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let trees = self.trees.read().map_err(|_| StorageError::Poisoned)?;
        let state = trees.get(&tree_id).ok_or(StorageError::TreeNotFound(tree_id))?;
        Ok(state.entries.get(key).cloned())
    }

    fn purge(&self, tree_id: TreeId) -> StorageResult<bool> {
        let mut trees = self.trees.write().map_err(|_| StorageError::Poisoned)?;
        Ok(trees.remove(&tree_id).is_some())
    }
}
