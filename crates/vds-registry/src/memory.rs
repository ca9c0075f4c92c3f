//! In-memory tree registry.
//!
//! [`InMemoryTreeRegistry`] keeps every tree in an arena of per-tree slots.
//! A slot pairs the tree's exclusive [`TreeToken`] with its record, so a
//! writer on one tree never waits for a writer on another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};
use vds_crypto::{hasher_for, public_key_for, validate_public_key};
use vds_types::{
    AnyPayload, Clock, HashStrategy, SignatureCipherSuite, Timestamp, Tree, TreeId, TreeSpec,
    TreeState, TreeUpdate,
};

use crate::error::{RegistryError, RegistryResult};
use crate::traits::{TreeRegistry, TreeToken};

/// Source of candidate ids for new trees.
pub type IdSource = Box<dyn Fn() -> TreeId + Send + Sync>;

/// How many ids creation draws before giving up on collisions.
const MAX_ID_ATTEMPTS: usize = 8;

struct TreeRecord {
    tree: Tree,
    private_key: AnyPayload,
}

struct TreeSlot {
    token: TreeToken,
    record: RwLock<TreeRecord>,
}

/// An in-memory implementation of [`TreeRegistry`].
pub struct InMemoryTreeRegistry {
    trees: RwLock<HashMap<TreeId, Arc<TreeSlot>>>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    ids: IdSource,
}

impl InMemoryTreeRegistry {
    /// Create an empty registry. Soft-deleted trees stay recoverable for
    /// `retention`.
    pub fn new(clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
            clock,
            retention,
            ids: Box::new(TreeId::random),
        }
    }

    /// Replace the random id generator.
    pub fn with_id_source(mut self, ids: IdSource) -> Self {
        self.ids = ids;
        self
    }

    pub fn retention_window(&self) -> Duration {
        self.retention
    }

    fn slot(&self, tree_id: TreeId) -> RegistryResult<Arc<TreeSlot>> {
        let trees = self.trees.read().map_err(|_| RegistryError::Poisoned)?;
        trees
            .get(&tree_id)
            .cloned()
            .ok_or(RegistryError::TreeNotFound(tree_id))
    }

    /// Read the record of a visible (not deleted) tree.
    fn read_visible<T>(
        &self,
        tree_id: TreeId,
        f: impl FnOnce(&TreeRecord) -> RegistryResult<T>,
    ) -> RegistryResult<T> {
        let slot = self.slot(tree_id)?;
        let record = slot.record.read().map_err(|_| RegistryError::Poisoned)?;
        if record.tree.deleted {
            return Err(RegistryError::TreeNotFound(tree_id));
        }
        f(&record)
    }

    fn is_expired(&self, tree: &Tree, now: Timestamp) -> bool {
        match (tree.deleted, tree.delete_time) {
            (true, Some(deleted_at)) => now.duration_since(deleted_at) >= self.retention,
            _ => false,
        }
    }
}

fn lock(token: &TreeToken) -> RegistryResult<MutexGuard<'_, ()>> {
    token.lock().map_err(|_| RegistryError::Poisoned)
}

fn required<T>(value: Option<T>, field: &str) -> RegistryResult<T> {
    value.ok_or_else(|| RegistryError::InvalidArgument(format!("{field} is required")))
}

/// Next `update_time`: the clock reading, but always strictly after the
/// previous value.
fn advance(previous: Timestamp, now: Timestamp) -> Timestamp {
    now.max(previous.next())
}

impl TreeRegistry for InMemoryTreeRegistry {
    fn create_tree(&self, spec: TreeSpec) -> RegistryResult<Tree> {
        let tree_type = required(spec.tree_type, "tree_type")?;
        let hash_strategy = required(spec.hash_strategy, "hash_strategy")?;
        let suite = required(spec.signature_cipher_suite, "signature_cipher_suite")?;
        let public_key = required(spec.public_key, "public_key")?;
        let private_key = required(spec.private_key, "private_key")?;

        if hash_strategy == HashStrategy::UnknownHashStrategy {
            return Err(RegistryError::InvalidArgument(
                "hash_strategy must be set".into(),
            ));
        }
        hasher_for(hash_strategy)?;
        if !hash_strategy.supports(tree_type) {
            return Err(RegistryError::InvalidArgument(format!(
                "hash strategy {hash_strategy} cannot build a {tree_type} tree"
            )));
        }
        if suite == SignatureCipherSuite::UnknownCipherSuite {
            return Err(RegistryError::InvalidArgument(
                "signature_cipher_suite must be set".into(),
            ));
        }
        validate_public_key(suite, &public_key)?;
        if public_key_for(suite, &private_key)? != public_key {
            return Err(RegistryError::InvalidArgument(
                "private key does not match public key".into(),
            ));
        }

        let now = self.clock.now();
        let mut tree = Tree {
            // First candidate id; replaced on collision.
            tree_id: (self.ids)(),
            tree_type,
            hash_strategy,
            tree_state: TreeState::Active,
            signature_cipher_suite: suite,
            public_key,
            display_name: spec.display_name,
            description: spec.description,
            storage_settings: spec.storage_settings,
            max_root_duration: spec.max_root_duration,
            create_time: now,
            update_time: now,
            deleted: false,
            delete_time: None,
        };

        let mut trees = self.trees.write().map_err(|_| RegistryError::Poisoned)?;
        let mut candidate = tree.tree_id;
        for attempt in 1..=MAX_ID_ATTEMPTS {
            if !trees.contains_key(&candidate) {
                tree.tree_id = candidate;
                trees.insert(
                    candidate,
                    Arc::new(TreeSlot {
                        token: Arc::new(Mutex::new(())),
                        record: RwLock::new(TreeRecord {
                            tree: tree.clone(),
                            private_key,
                        }),
                    }),
                );
                info!(
                    tree_id = %candidate,
                    tree_type = %tree_type,
                    hash_strategy = %hash_strategy,
                    "created tree"
                );
                return Ok(tree);
            }
            debug!(tree_id = %candidate, attempt, "tree id collision");
            if attempt < MAX_ID_ATTEMPTS {
                candidate = (self.ids)();
            }
        }
        warn!(tree_id = %candidate, "could not assign a unique tree id");
        Err(RegistryError::AlreadyExists(candidate))
    }

    fn get_tree(&self, tree_id: TreeId) -> RegistryResult<Tree> {
        debug!(tree_id = %tree_id, "get tree");
        self.read_visible(tree_id, |record| Ok(record.tree.clone()))
    }

    fn list_trees(&self, show_deleted: bool) -> RegistryResult<Vec<Tree>> {
        let slots: Vec<Arc<TreeSlot>> = {
            let trees = self.trees.read().map_err(|_| RegistryError::Poisoned)?;
            trees.values().cloned().collect()
        };
        let mut result = Vec::with_capacity(slots.len());
        for slot in slots {
            let record = slot.record.read().map_err(|_| RegistryError::Poisoned)?;
            if show_deleted || !record.tree.deleted {
                result.push(record.tree.clone());
            }
        }
        result.sort_by_key(|t| t.tree_id);
        Ok(result)
    }

    fn update_tree(&self, tree_id: TreeId, update: TreeUpdate) -> RegistryResult<Tree> {
        let readonly = update.readonly_fields();
        if !readonly.is_empty() {
            warn!(tree_id = %tree_id, fields = ?readonly, "rejected update of readonly fields");
            return Err(RegistryError::ReadonlyField(readonly.join(", ")));
        }
        if update.is_empty() {
            return Err(RegistryError::InvalidArgument("update sets no fields".into()));
        }

        let slot = self.slot(tree_id)?;
        let _guard = lock(&slot.token)?;
        let mut record = slot.record.write().map_err(|_| RegistryError::Poisoned)?;
        if record.tree.deleted {
            return Err(RegistryError::TreeNotFound(tree_id));
        }

        if let Some(key) = &update.private_key {
            let derived = public_key_for(record.tree.signature_cipher_suite, key)?;
            if derived != record.tree.public_key {
                warn!(tree_id = %tree_id, "rejected private key that does not match the tree's public key");
                return Err(RegistryError::InvalidArgument(
                    "private key does not match the tree's public key".into(),
                ));
            }
        }

        let previous_state = record.tree.tree_state;
        let now = self.clock.now();
        let tree = &mut record.tree;
        if let Some(state) = update.tree_state {
            tree.tree_state = state;
        }
        if let Some(name) = update.display_name {
            tree.display_name = Some(name);
        }
        if let Some(description) = update.description {
            tree.description = Some(description);
        }
        if let Some(settings) = update.storage_settings {
            tree.storage_settings = Some(settings);
        }
        if let Some(duration) = update.max_root_duration {
            tree.max_root_duration = duration;
        }
        tree.update_time = advance(tree.update_time, now);
        let updated = tree.clone();

        if let Some(key) = update.private_key {
            record.private_key = key;
        }

        if previous_state != updated.tree_state {
            info!(tree_id = %tree_id, from = %previous_state, to = %updated.tree_state, "tree state changed");
        } else {
            info!(tree_id = %tree_id, "updated tree");
        }
        Ok(updated)
    }

    fn soft_delete_tree(&self, tree_id: TreeId) -> RegistryResult<Tree> {
        let slot = self.slot(tree_id)?;
        let _guard = lock(&slot.token)?;
        let mut record = slot.record.write().map_err(|_| RegistryError::Poisoned)?;
        if record.tree.deleted {
            return Err(RegistryError::FailedPrecondition(format!(
                "tree {tree_id} is already deleted"
            )));
        }
        let now = self.clock.now();
        record.tree.deleted = true;
        record.tree.delete_time = Some(now);
        info!(tree_id = %tree_id, delete_time = %now, "soft-deleted tree");
        Ok(record.tree.clone())
    }

    fn undelete_tree(&self, tree_id: TreeId) -> RegistryResult<Tree> {
        let slot = self.slot(tree_id)?;
        let _guard = lock(&slot.token)?;
        let mut record = slot.record.write().map_err(|_| RegistryError::Poisoned)?;
        if !record.tree.deleted {
            return Err(RegistryError::FailedPrecondition(format!(
                "tree {tree_id} is not deleted"
            )));
        }
        if self.is_expired(&record.tree, self.clock.now()) {
            warn!(tree_id = %tree_id, "undelete after retention window");
            return Err(RegistryError::FailedPrecondition(format!(
                "retention window for tree {tree_id} has expired"
            )));
        }
        record.tree.deleted = false;
        record.tree.delete_time = None;
        info!(tree_id = %tree_id, "undeleted tree");
        Ok(record.tree.clone())
    }

    fn reap_expired(&self) -> RegistryResult<Vec<TreeId>> {
        let now = self.clock.now();
        let candidates: Vec<(TreeId, Arc<TreeSlot>)> = {
            let trees = self.trees.read().map_err(|_| RegistryError::Poisoned)?;
            trees.iter().map(|(id, slot)| (*id, Arc::clone(slot))).collect()
        };

        let mut reaped = Vec::new();
        for (tree_id, slot) in candidates {
            let _guard = lock(&slot.token)?;
            let expired = {
                let record = slot.record.read().map_err(|_| RegistryError::Poisoned)?;
                self.is_expired(&record.tree, now)
            };
            if !expired {
                continue;
            }
            let mut trees = self.trees.write().map_err(|_| RegistryError::Poisoned)?;
            if trees.remove(&tree_id).is_some() {
                info!(tree_id = %tree_id, "permanently removed tree");
                reaped.push(tree_id);
            }
        }
        reaped.sort();
        Ok(reaped)
    }

    fn admit_write(&self, tree_id: TreeId) -> RegistryResult<Tree> {
        self.read_visible(tree_id, |record| {
            if !record.tree.accepts_writes() {
                debug!(tree_id = %tree_id, state = %record.tree.tree_state, "write rejected");
                return Err(RegistryError::FailedPrecondition(format!(
                    "tree {tree_id} is {} and does not accept writes",
                    record.tree.tree_state
                )));
            }
            Ok(record.tree.clone())
        })
    }

    fn private_key(&self, tree_id: TreeId) -> RegistryResult<AnyPayload> {
        self.read_visible(tree_id, |record| Ok(record.private_key.clone()))
    }

    fn tree_token(&self, tree_id: TreeId) -> RegistryResult<TreeToken> {
        Ok(Arc::clone(&self.slot(tree_id)?.token))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vds_crypto::SigningKey;
    use vds_types::{Code, ManualClock, TreeType};

    use super::*;

    const RETENTION: Duration = Duration::from_secs(3600);

    fn registry() -> (Arc<ManualClock>, InMemoryTreeRegistry) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_nanos(1_000_000_000)));
        let registry = InMemoryTreeRegistry::new(clock.clone(), RETENTION);
        (clock, registry)
    }

    fn spec_with(key: &SigningKey, tree_type: TreeType, strategy: HashStrategy) -> TreeSpec {
        TreeSpec {
            tree_type: Some(tree_type),
            hash_strategy: Some(strategy),
            signature_cipher_suite: Some(SignatureCipherSuite::Ed25519),
            public_key: Some(key.verifying_key().as_bytes().to_vec()),
            private_key: Some(key.to_payload()),
            display_name: Some("test".into()),
            ..Default::default()
        }
    }

    fn log_spec() -> TreeSpec {
        spec_with(&SigningKey::generate(), TreeType::Log, HashStrategy::Rfc6962Sha256)
    }

    #[test]
    fn create_assigns_identity_and_times() {
        let (clock, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        assert!(tree.tree_id.as_i64() > 0);
        assert_eq!(tree.tree_state, TreeState::Active);
        assert_eq!(tree.create_time, clock.now());
        assert_eq!(tree.update_time, tree.create_time);
        assert!(!tree.deleted);
        assert_eq!(registry.get_tree(tree.tree_id).unwrap(), tree);
    }

    #[test]
    fn create_rejects_invalid_specs() {
        let (_, registry) = registry();
        let key = SigningKey::generate();

        let mut missing_type = spec_with(&key, TreeType::Log, HashStrategy::Rfc6962Sha256);
        missing_type.tree_type = None;

        let unknown = spec_with(&key, TreeType::Log, HashStrategy::UnknownHashStrategy);
        let mismatched = spec_with(&key, TreeType::Map, HashStrategy::Rfc6962Sha256);

        let mut unsupported_suite = spec_with(&key, TreeType::Log, HashStrategy::Rfc6962Sha256);
        unsupported_suite.signature_cipher_suite = Some(SignatureCipherSuite::EcdsaP256Sha256);

        let mut wrong_public = spec_with(&key, TreeType::Log, HashStrategy::Rfc6962Sha256);
        wrong_public.public_key = Some(SigningKey::generate().verifying_key().as_bytes().to_vec());

        let mut short_public = spec_with(&key, TreeType::Log, HashStrategy::Rfc6962Sha256);
        short_public.public_key = Some(vec![1, 2, 3]);

        let mut no_private = spec_with(&key, TreeType::Log, HashStrategy::Rfc6962Sha256);
        no_private.private_key = None;

        for spec in [
            missing_type,
            unknown,
            mismatched,
            unsupported_suite,
            wrong_public,
            short_public,
            no_private,
        ] {
            let err = registry.create_tree(spec).unwrap_err();
            assert_eq!(err.code(), Code::InvalidArgument, "{err}");
        }
        assert!(registry.list_trees(true).unwrap().is_empty());
    }

    #[test]
    fn map_strategies_create_map_trees() {
        let (_, registry) = registry();
        let key = SigningKey::generate();
        for strategy in [HashStrategy::TestMapHasher, HashStrategy::ConiksSha512_256] {
            let tree = registry
                .create_tree(spec_with(&key, TreeType::Map, strategy))
                .unwrap();
            assert_eq!(tree.tree_type, TreeType::Map);
        }
    }

    #[test]
    fn id_collision_is_retried_then_rejected() {
        let (clock, _) = registry();
        let draws = Arc::new(AtomicUsize::new(0));
        let counter = draws.clone();
        let registry = InMemoryTreeRegistry::new(clock, RETENTION).with_id_source(Box::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                TreeId::new(7).unwrap()
            },
        ));

        registry.create_tree(log_spec()).unwrap();
        let err = registry.create_tree(log_spec()).unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
        assert_eq!(draws.load(Ordering::SeqCst), 1 + MAX_ID_ATTEMPTS);
    }

    #[test]
    fn id_collision_recovers_with_fresh_id() {
        let (clock, _) = registry();
        let ids = Mutex::new(vec![2, 1, 1]);
        let registry = InMemoryTreeRegistry::new(clock, RETENTION).with_id_source(Box::new(
            move || {
                let next = ids.lock().unwrap().pop().unwrap_or(99);
                TreeId::new(next).unwrap()
            },
        ));
        let first = registry.create_tree(log_spec()).unwrap();
        let second = registry.create_tree(log_spec()).unwrap();
        assert_eq!(first.tree_id.as_i64(), 1);
        assert_eq!(second.tree_id.as_i64(), 2);
    }

    #[test]
    fn readonly_fields_rejected_and_unchanged() {
        let (clock, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();

        let attempts = [
            TreeUpdate {
                tree_type: Some(TreeType::Map),
                ..Default::default()
            },
            TreeUpdate {
                hash_strategy: Some(HashStrategy::TestMapHasher),
                ..Default::default()
            },
            TreeUpdate {
                public_key: Some(vec![0; 32]),
                display_name: Some("x".into()),
                ..Default::default()
            },
            TreeUpdate {
                create_time: Some(Timestamp::zero()),
                ..Default::default()
            },
        ];
        for update in attempts {
            let err = registry.update_tree(tree.tree_id, update).unwrap_err();
            assert!(matches!(err, RegistryError::ReadonlyField(_)));
            assert_eq!(err.code(), Code::InvalidArgument);
        }
        assert_eq!(registry.get_tree(tree.tree_id).unwrap(), tree);

        for i in 0..10 {
            clock.advance(Duration::from_millis(1));
            let updated = registry
                .update_tree(tree.tree_id, TreeUpdate::default().description(format!("rev {i}")))
                .unwrap();
            assert_eq!(updated.tree_id, tree.tree_id);
            assert_eq!(updated.tree_type, tree.tree_type);
            assert_eq!(updated.hash_strategy, tree.hash_strategy);
            assert_eq!(updated.signature_cipher_suite, tree.signature_cipher_suite);
            assert_eq!(updated.public_key, tree.public_key);
            assert_eq!(updated.create_time, tree.create_time);
        }
    }

    #[test]
    fn update_time_strictly_advances() {
        let (_, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        let mut last = tree.update_time;
        for _ in 0..5 {
            let updated = registry
                .update_tree(tree.tree_id, TreeUpdate::default().display_name("same clock"))
                .unwrap();
            assert!(updated.update_time > last);
            last = updated.update_time;
        }
    }

    #[test]
    fn empty_update_rejected() {
        let (_, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        let err = registry
            .update_tree(tree.tree_id, TreeUpdate::default())
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn freeze_blocks_writes_not_reads() {
        let (_, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        registry.admit_write(tree.tree_id).unwrap();

        registry
            .update_tree(tree.tree_id, TreeUpdate::default().state(TreeState::Frozen))
            .unwrap();
        let err = registry.admit_write(tree.tree_id).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
        assert_eq!(
            registry.get_tree(tree.tree_id).unwrap().tree_state,
            TreeState::Frozen
        );

        registry
            .update_tree(tree.tree_id, TreeUpdate::default().state(TreeState::Active))
            .unwrap();
        registry.admit_write(tree.tree_id).unwrap();
    }

    #[test]
    fn key_rotation_must_keep_public_key() {
        let (_, registry) = registry();
        let key = SigningKey::generate();
        let tree = registry
            .create_tree(spec_with(&key, TreeType::Log, HashStrategy::Rfc6962Sha256))
            .unwrap();

        let same = SigningKey::from_payload(&key.to_payload()).unwrap();
        registry
            .update_tree(tree.tree_id, TreeUpdate::default().private_key(same.to_payload()))
            .unwrap();

        let other = SigningKey::generate();
        let err = registry
            .update_tree(
                tree.tree_id,
                TreeUpdate::default()
                    .private_key(other.to_payload())
                    .display_name("ignored"),
            )
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(registry.get_tree(tree.tree_id).unwrap().display_name.as_deref(), Some("test"));
        assert_eq!(registry.private_key(tree.tree_id).unwrap(), key.to_payload());
    }

    #[test]
    fn soft_delete_then_undelete_restores() {
        let (clock, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();

        clock.advance(Duration::from_secs(5));
        let deleted = registry.soft_delete_tree(tree.tree_id).unwrap();
        assert!(deleted.deleted);
        assert_eq!(deleted.delete_time, Some(clock.now()));
        assert_eq!(registry.get_tree(tree.tree_id).unwrap_err().code(), Code::NotFound);
        assert_eq!(registry.admit_write(tree.tree_id).unwrap_err().code(), Code::NotFound);
        assert!(registry.list_trees(false).unwrap().is_empty());
        assert_eq!(registry.list_trees(true).unwrap().len(), 1);

        let restored = registry.undelete_tree(tree.tree_id).unwrap();
        assert_eq!(restored, tree);
        assert_eq!(registry.get_tree(tree.tree_id).unwrap(), tree);
    }

    #[test]
    fn delete_and_undelete_preconditions() {
        let (_, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        let err = registry.undelete_tree(tree.tree_id).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);

        registry.soft_delete_tree(tree.tree_id).unwrap();
        let err = registry.soft_delete_tree(tree.tree_id).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[test]
    fn undelete_after_retention_fails_and_reap_removes() {
        let (clock, registry) = registry();
        let doomed = registry.create_tree(log_spec()).unwrap();
        let kept = registry.create_tree(log_spec()).unwrap();
        registry.soft_delete_tree(doomed.tree_id).unwrap();

        clock.advance(RETENTION);
        let err = registry.undelete_tree(doomed.tree_id).unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);

        assert_eq!(registry.reap_expired().unwrap(), vec![doomed.tree_id]);
        assert!(registry.reap_expired().unwrap().is_empty());
        assert_eq!(registry.undelete_tree(doomed.tree_id).unwrap_err().code(), Code::NotFound);
        assert!(registry.tree_token(doomed.tree_id).is_err());
        assert_eq!(registry.list_trees(true).unwrap(), vec![kept]);
    }

    #[test]
    fn reap_skips_trees_inside_window() {
        let (clock, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        registry.soft_delete_tree(tree.tree_id).unwrap();
        clock.advance(RETENTION - Duration::from_nanos(1));
        assert!(registry.reap_expired().unwrap().is_empty());
        registry.undelete_tree(tree.tree_id).unwrap();
    }

    #[test]
    fn concurrent_undeletes_at_most_one_wins() {
        let (_, registry) = registry();
        let tree = registry.create_tree(log_spec()).unwrap();
        registry.soft_delete_tree(tree.tree_id).unwrap();

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.undelete_tree(tree.tree_id)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.code(), Code::FailedPrecondition);
        }
    }

    #[test]
    fn concurrent_updates_serialize_per_tree() {
        let (_, registry) = registry();
        let a = registry.create_tree(log_spec()).unwrap();
        let b = registry.create_tree(log_spec()).unwrap();

        let times: Vec<Timestamp> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let registry = &registry;
                    let id = if i % 2 == 0 { a.tree_id } else { b.tree_id };
                    s.spawn(move || {
                        registry
                            .update_tree(id, TreeUpdate::default().description(format!("{i}")))
                            .unwrap()
                            .update_time
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut per_tree_a: Vec<_> = times.iter().step_by(2).copied().collect();
        per_tree_a.sort();
        per_tree_a.dedup();
        assert_eq!(per_tree_a.len(), 8);
        assert_eq!(
            registry.get_tree(a.tree_id).unwrap().update_time,
            *per_tree_a.last().unwrap()
        );
    }
}
