use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};
use vds_crypto::{hasher_for, Ed25519SignerFactory, RootSigner, SignerFactory};
use vds_registry::{InMemoryTreeRegistry, TreeRegistry, TreeToken};
use vds_roots::{InMemoryRootLog, LogContent, MapContent, RootError, RootLog};
use vds_storage::{
    InMemoryLogStorage, InMemoryMapStorage, LogStorage, MapStorage, MapUpdate, StorageError,
};
use vds_types::{
    AnyPayload, Clock, Code, SignedLogRoot, SignedMapRoot, Tree, TreeId, TreeSpec, TreeType,
    TreeUpdate,
};

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};

/// Entry point for tree administration, writes, and root reads.
pub struct TreeService {
    registry: Arc<dyn TreeRegistry>,
    logs: Arc<dyn LogStorage>,
    maps: Arc<dyn MapStorage>,
    roots: Arc<dyn RootLog>,
    signers: Arc<dyn SignerFactory>,
    clock: Arc<dyn Clock>,
    /// Reaped trees whose storage or roots could not be purged yet.
    unpurged: Mutex<Vec<TreeId>>,
}

impl TreeService {
    pub fn new(
        registry: Arc<dyn TreeRegistry>,
        logs: Arc<dyn LogStorage>,
        maps: Arc<dyn MapStorage>,
        roots: Arc<dyn RootLog>,
        signers: Arc<dyn SignerFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            logs,
            maps,
            roots,
            signers,
            clock,
            unpurged: Mutex::new(Vec::new()),
        }
    }

    /// A service backed entirely by in-memory components and Ed25519
    /// signing.
    pub fn in_memory(config: &ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        Self::in_memory_with_signers(config, clock, Arc::new(Ed25519SignerFactory))
    }

    pub fn in_memory_with_signers(
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
        signers: Arc<dyn SignerFactory>,
    ) -> Self {
        Self::new(
            Arc::new(InMemoryTreeRegistry::new(
                Arc::clone(&clock),
                config.retention_window(),
            )),
            Arc::new(InMemoryLogStorage::new()),
            Arc::new(InMemoryMapStorage::new()),
            Arc::new(InMemoryRootLog::new(
                Arc::clone(&clock),
                config.signing.max_attempts,
            )),
            signers,
            clock,
        )
    }

    // -- Tree administration -----------------------------------------------

    /// Register a tree and initialize its storage.
    pub fn create_tree(&self, spec: TreeSpec) -> ServiceResult<Tree> {
        let tree = self.registry.create_tree(spec)?;
        match tree.tree_type {
            TreeType::Log => self.logs.init_tree(&tree)?,
            TreeType::Map => self.maps.init_tree(&tree)?,
        }
        Ok(tree)
    }

    pub fn get_tree(&self, tree_id: TreeId) -> ServiceResult<Tree> {
        let tree = self.registry.get_tree(tree_id)?;
        check_strategy(&tree)?;
        Ok(tree)
    }

    pub fn list_trees(&self, show_deleted: bool) -> ServiceResult<Vec<Tree>> {
        Ok(self.registry.list_trees(show_deleted)?)
    }

    pub fn update_tree(&self, tree_id: TreeId, update: TreeUpdate) -> ServiceResult<Tree> {
        self.get_tree(tree_id)?;
        Ok(self.registry.update_tree(tree_id, update)?)
    }

    pub fn soft_delete_tree(&self, tree_id: TreeId) -> ServiceResult<Tree> {
        Ok(self.registry.soft_delete_tree(tree_id)?)
    }

    pub fn undelete_tree(&self, tree_id: TreeId) -> ServiceResult<Tree> {
        Ok(self.registry.undelete_tree(tree_id)?)
    }

    // -- Writes ------------------------------------------------------------

    /// Append leaves to a log tree and commit the resulting root.
    pub fn queue_leaves(
        &self,
        tree_id: TreeId,
        leaves: Vec<Vec<u8>>,
    ) -> ServiceResult<SignedLogRoot> {
        if leaves.is_empty() {
            return Err(ServiceError::InvalidArgument("no leaves to queue".into()));
        }
        let token = self.registry.tree_token(tree_id)?;
        let _guard = lock(&token)?;
        let tree = self.admit(tree_id, TreeType::Log)?;

        let pending = self.logs.prepare_append(tree_id, leaves)?;
        let content = LogContent {
            tree_size: to_i64(pending.head.tree_size)?,
            root_hash: pending.head.root_hash.clone(),
        };
        let signer = self.signer_for(&tree)?;
        let logs = &self.logs;
        let root = self.roots.commit_log_with(
            &tree,
            content,
            signer.as_ref(),
            Box::new(move || {
                logs.apply_append(pending)
                    .map(drop)
                    .map_err(|e| apply_failed(tree_id, e))
            }),
        )?;
        Ok(root)
    }

    /// Apply map updates and commit the resulting root with `metadata`.
    pub fn set_map_leaves(
        &self,
        tree_id: TreeId,
        updates: Vec<MapUpdate>,
        metadata: Option<AnyPayload>,
    ) -> ServiceResult<SignedMapRoot> {
        let token = self.registry.tree_token(tree_id)?;
        let _guard = lock(&token)?;
        let tree = self.admit(tree_id, TreeType::Map)?;

        let pending = self.maps.prepare_update(tree_id, updates)?;
        let content = MapContent {
            root_hash: pending.root_hash.clone(),
            metadata,
        };
        let signer = self.signer_for(&tree)?;
        let maps = &self.maps;
        let root = self.roots.commit_map_with(
            &tree,
            content,
            signer.as_ref(),
            Box::new(move || {
                maps.apply_update(pending)
                    .map(drop)
                    .map_err(|e| apply_failed(tree_id, e))
            }),
        )?;
        Ok(root)
    }

    // -- Reads -------------------------------------------------------------

    pub fn get_leaf(&self, tree_id: TreeId, index: u64) -> ServiceResult<Option<Vec<u8>>> {
        self.readable(tree_id, TreeType::Log)?;
        Ok(self.logs.leaf(tree_id, index)?)
    }

    pub fn get_map_value(&self, tree_id: TreeId, key: &[u8]) -> ServiceResult<Option<Vec<u8>>> {
        self.readable(tree_id, TreeType::Map)?;
        Ok(self.maps.get(tree_id, key)?)
    }

    pub fn latest_log_root(&self, tree_id: TreeId) -> ServiceResult<SignedLogRoot> {
        self.readable(tree_id, TreeType::Log)?;
        Ok(self.roots.latest_log_root(tree_id)?)
    }

    pub fn log_root_at(&self, tree_id: TreeId, revision: i64) -> ServiceResult<SignedLogRoot> {
        self.readable(tree_id, TreeType::Log)?;
        Ok(self.roots.log_root_at(tree_id, revision)?)
    }

    pub fn log_roots(&self, tree_id: TreeId) -> ServiceResult<Vec<SignedLogRoot>> {
        self.readable(tree_id, TreeType::Log)?;
        Ok(self.roots.log_roots(tree_id)?)
    }

    pub fn latest_map_root(&self, tree_id: TreeId) -> ServiceResult<SignedMapRoot> {
        self.readable(tree_id, TreeType::Map)?;
        Ok(self.roots.latest_map_root(tree_id)?)
    }

    pub fn map_root_at(&self, tree_id: TreeId, revision: i64) -> ServiceResult<SignedMapRoot> {
        self.readable(tree_id, TreeType::Map)?;
        Ok(self.roots.map_root_at(tree_id, revision)?)
    }

    pub fn map_roots(&self, tree_id: TreeId) -> ServiceResult<Vec<SignedMapRoot>> {
        self.readable(tree_id, TreeType::Map)?;
        Ok(self.roots.map_roots(tree_id)?)
    }

    // -- Time-driven work --------------------------------------------------

    /// Issue an idle root for every writable tree whose `max_root_duration`
    /// has passed since its last root. Returns the trees that got one.
    ///
    /// A failure on one tree is logged and does not stop the others.
    pub fn sequence_idle(&self) -> ServiceResult<Vec<TreeId>> {
        let mut committed = Vec::new();
        for tree in self.registry.list_trees(false)? {
            if tree.idle_interval().is_none() || !tree.accepts_writes() {
                continue;
            }
            match self.commit_idle(tree.tree_id) {
                Ok(true) => committed.push(tree.tree_id),
                Ok(false) => {}
                Err(e) => {
                    error!(tree_id = %tree.tree_id, error = %e, "idle root failed");
                }
            }
        }
        Ok(committed)
    }

    /// Permanently remove trees past their retention window, with their
    /// storage and roots. Returns the trees removed from the registry.
    ///
    /// A tree whose purge fails is logged and purged again on the next call.
    pub fn reap_expired(&self) -> ServiceResult<Vec<TreeId>> {
        let reaped = self.registry.reap_expired()?;
        let mut unpurged = self
            .unpurged
            .lock()
            .map_err(|_| ServiceError::Internal("purge backlog poisoned".into()))?;
        let mut backlog = std::mem::take(&mut *unpurged);
        backlog.extend(reaped.iter().copied());

        for tree_id in backlog {
            match self.purge(tree_id) {
                Ok(()) => info!(tree_id = %tree_id, "hard-deleted tree"),
                Err(e) => {
                    error!(tree_id = %tree_id, error = %e, "purge failed, will retry");
                    unpurged.push(tree_id);
                }
            }
        }
        Ok(reaped)
    }

    fn purge(&self, tree_id: TreeId) -> ServiceResult<()> {
        self.logs.purge(tree_id)?;
        self.maps.purge(tree_id)?;
        self.roots.purge(tree_id)?;
        Ok(())
    }

    fn commit_idle(&self, tree_id: TreeId) -> ServiceResult<bool> {
        let token = self.registry.tree_token(tree_id)?;
        let _guard = lock(&token)?;
        // Re-read under the token: the tree may have changed since listing.
        let tree = self.registry.admit_write(tree_id)?;
        check_strategy(&tree)?;
        if !self.roots.idle_due(&tree, self.clock.now())? {
            return Ok(false);
        }

        let signer = self.signer_for(&tree)?;
        match tree.tree_type {
            TreeType::Log => {
                let head = self.logs.head(tree_id)?;
                let content = LogContent {
                    tree_size: to_i64(head.tree_size)?,
                    root_hash: head.root_hash,
                };
                let root = self.roots.commit_log(&tree, content, signer.as_ref())?;
                debug!(tree_id = %tree_id, revision = root.tree_revision, "idle log root");
            }
            TreeType::Map => {
                let metadata = match self.roots.latest_map_root(tree_id) {
                    Ok(previous) => previous.metadata,
                    Err(e) if e.code() == Code::NotFound => None,
                    Err(e) => return Err(e.into()),
                };
                let content = MapContent {
                    root_hash: self.maps.root_hash(tree_id)?,
                    metadata,
                };
                let root = self.roots.commit_map(&tree, content, signer.as_ref())?;
                debug!(tree_id = %tree_id, revision = root.map_revision, "idle map root");
            }
        }
        Ok(true)
    }

    fn admit(&self, tree_id: TreeId, expected: TreeType) -> ServiceResult<Tree> {
        let tree = self.registry.admit_write(tree_id)?;
        check_tree(&tree, expected)?;
        Ok(tree)
    }

    fn readable(&self, tree_id: TreeId, expected: TreeType) -> ServiceResult<Tree> {
        debug!(tree_id = %tree_id, "read");
        let tree = self.registry.get_tree(tree_id)?;
        check_tree(&tree, expected)?;
        Ok(tree)
    }

    fn signer_for(&self, tree: &Tree) -> ServiceResult<Arc<dyn RootSigner>> {
        let key = self.registry.private_key(tree.tree_id)?;
        Ok(self.signers.signer_for(tree, &key)?)
    }
}

fn lock(token: &TreeToken) -> ServiceResult<MutexGuard<'_, ()>> {
    token
        .lock()
        .map_err(|_| ServiceError::Internal("tree token poisoned".into()))
}

fn apply_failed(tree_id: TreeId, e: StorageError) -> RootError {
    error!(tree_id = %tree_id, error = %e, "storage apply failed, root withheld");
    RootError::Apply {
        tree_id,
        code: e.code(),
        reason: e.to_string(),
    }
}

fn check_strategy(tree: &Tree) -> ServiceResult<()> {
    hasher_for(tree.hash_strategy)?;
    Ok(())
}

fn check_tree(tree: &Tree, expected: TreeType) -> ServiceResult<()> {
    check_strategy(tree)?;
    if tree.tree_type != expected {
        return Err(ServiceError::InvalidArgument(format!(
            "tree {} is a {} tree, not {}",
            tree.tree_id, tree.tree_type, expected
        )));
    }
    Ok(())
}

fn to_i64(size: u64) -> ServiceResult<i64> {
    i64::try_from(size).map_err(|_| ServiceError::Internal(format!("tree size {size} overflows")))
}
