use std::sync::{Arc, Mutex};

use vds_types::{AnyPayload, Tree, TreeId, TreeSpec, TreeUpdate};

use crate::error::RegistryResult;

/// Exclusive per-tree token. Holding its lock serializes all mutations of
/// the tree.
pub type TreeToken = Arc<Mutex<()>>;

/// Owner of tree records.
///
/// Soft-deleted trees are invisible to [`get_tree`](Self::get_tree) and
/// [`admit_write`](Self::admit_write), but still count for id uniqueness
/// and can be listed with `show_deleted`.
pub trait TreeRegistry: Send + Sync {
    /// Validate `spec` and register a new ACTIVE tree.
    fn create_tree(&self, spec: TreeSpec) -> RegistryResult<Tree>;

    /// Fetch a tree that is not soft-deleted.
    fn get_tree(&self, tree_id: TreeId) -> RegistryResult<Tree>;

    /// All trees ordered by id, optionally including soft-deleted ones.
    fn list_trees(&self, show_deleted: bool) -> RegistryResult<Vec<Tree>>;

    /// Apply a patch of mutable fields.
    fn update_tree(&self, tree_id: TreeId, update: TreeUpdate) -> RegistryResult<Tree>;

    /// Mark a tree deleted. It stays recoverable until the retention window
    /// expires.
    fn soft_delete_tree(&self, tree_id: TreeId) -> RegistryResult<Tree>;

    /// Restore a soft-deleted tree whose retention window has not expired.
    fn undelete_tree(&self, tree_id: TreeId) -> RegistryResult<Tree>;

    /// Permanently remove every soft-deleted tree whose retention window has
    /// expired. Returns the removed ids.
    fn reap_expired(&self) -> RegistryResult<Vec<TreeId>>;

    /// Check that writes may target the tree and return its current record.
    fn admit_write(&self, tree_id: TreeId) -> RegistryResult<Tree>;

    /// The tree's stored private key, for building its signer.
    fn private_key(&self, tree_id: TreeId) -> RegistryResult<AnyPayload>;

    /// The tree's exclusive mutation token.
    ///
    /// Registry mutations take this token themselves; do not call them while
    /// holding it.
    fn tree_token(&self, tree_id: TreeId) -> RegistryResult<TreeToken>;
}
