use vds_crypto::RootSigner;
use vds_types::{AnyPayload, SignedLogRoot, SignedMapRoot, Timestamp, Tree, TreeId};

use crate::error::{RootError, RootResult};

/// Storage write that makes a commit's content visible. It runs after the
/// root is signed; the root is published only if it succeeds.
pub type Apply<'a> = Box<dyn FnOnce() -> RootResult<()> + 'a>;

/// Content a log root commits to, as reported by storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogContent {
    pub tree_size: i64,
    pub root_hash: Vec<u8>,
}

/// Content a map root commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapContent {
    pub root_hash: Vec<u8>,
    pub metadata: Option<AnyPayload>,
}

/// Per-tree sequences of signed roots.
///
/// Commits to the same tree are serialized by the implementation. Commits
/// to different trees never wait on each other.
pub trait RootLog: Send + Sync {
    /// Sign the next root of a log tree, run `apply`, and append the root.
    /// Nothing is appended if signing or `apply` fails.
    fn commit_log_with(
        &self,
        tree: &Tree,
        content: LogContent,
        signer: &dyn RootSigner,
        apply: Apply<'_>,
    ) -> RootResult<SignedLogRoot>;

    /// Sign the next root of a map tree, run `apply`, and append the root.
    fn commit_map_with(
        &self,
        tree: &Tree,
        content: MapContent,
        signer: &dyn RootSigner,
        apply: Apply<'_>,
    ) -> RootResult<SignedMapRoot>;

    /// Commit a log root over content that is already stored.
    fn commit_log(
        &self,
        tree: &Tree,
        content: LogContent,
        signer: &dyn RootSigner,
    ) -> RootResult<SignedLogRoot> {
        self.commit_log_with(tree, content, signer, Box::new(|| Ok::<(), RootError>(())))
    }

    /// Commit a map root over content that is already stored.
    fn commit_map(
        &self,
        tree: &Tree,
        content: MapContent,
        signer: &dyn RootSigner,
    ) -> RootResult<SignedMapRoot> {
        self.commit_map_with(tree, content, signer, Box::new(|| Ok::<(), RootError>(())))
    }

    fn latest_log_root(&self, tree_id: TreeId) -> RootResult<SignedLogRoot>;

    fn log_root_at(&self, tree_id: TreeId, revision: i64) -> RootResult<SignedLogRoot>;

    /// Every log root issued for the tree, in revision order.
    fn log_roots(&self, tree_id: TreeId) -> RootResult<Vec<SignedLogRoot>>;

    fn latest_map_root(&self, tree_id: TreeId) -> RootResult<SignedMapRoot>;

    fn map_root_at(&self, tree_id: TreeId, revision: i64) -> RootResult<SignedMapRoot>;

    /// Every map root issued for the tree, in revision order.
    fn map_roots(&self, tree_id: TreeId) -> RootResult<Vec<SignedMapRoot>>;

    /// Timestamp of the tree's latest root, if any.
    fn last_commit_time(&self, tree_id: TreeId) -> RootResult<Option<Timestamp>>;

    /// Permanently drop the tree's roots. Returns `true` if any existed.
    fn purge(&self, tree_id: TreeId) -> RootResult<bool>;

    /// Returns `true` if the tree's idle interval has passed without a root.
    ///
    /// A tree that has never committed is measured from its creation.
    fn idle_due(&self, tree: &Tree, now: Timestamp) -> RootResult<bool> {
        let Some(interval) = tree.idle_interval() else {
            return Ok(false);
        };
        let since = self
            .last_commit_time(tree.tree_id)?
            .unwrap_or(tree.create_time);
        Ok(now.duration_since(since) >= interval)
    }
}
