//! In-memory root commitment log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info, warn};
use vds_crypto::{hasher_for, RootSigner};
use vds_types::{
    Clock, DigitallySigned, LogRoot, MapRoot, SignedLogRoot, SignedMapRoot, Timestamp, Tree,
    TreeId, TreeType,
};

use crate::error::{RootError, RootResult};
use crate::traits::{Apply, LogContent, MapContent, RootLog};

/// Revision and timestamp of a published root.
trait Committed: Clone {
    fn revision(&self) -> i64;
    fn timestamp(&self) -> Timestamp;
}

impl Committed for SignedLogRoot {
    fn revision(&self) -> i64 {
        self.tree_revision
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp_nanos
    }
}

impl Committed for SignedMapRoot {
    fn revision(&self) -> i64 {
        self.map_revision
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp_nanos
    }
}

/// One tree's root history.
///
/// `commit` is held for the whole commit and remembers the clock reading
/// taken by the last one. `roots` is held only to read or to publish a
/// finished root.
struct RootSlot<R> {
    commit: Mutex<Option<Timestamp>>,
    roots: RwLock<Vec<R>>,
}

impl<R> Default for RootSlot<R> {
    fn default() -> Self {
        Self {
            commit: Mutex::new(None),
            roots: RwLock::new(Vec::new()),
        }
    }
}

impl<R: Committed> RootSlot<R> {
    fn latest(&self) -> RootResult<Option<R>> {
        let roots = self.roots.read().map_err(|_| RootError::Poisoned)?;
        Ok(roots.last().cloned())
    }

    fn at(&self, revision: i64) -> RootResult<Option<R>> {
        let roots = self.roots.read().map_err(|_| RootError::Poisoned)?;
        // Revision r lives at index r - 1.
        let root = revision
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| roots.get(i))
            .cloned();
        Ok(root)
    }

    /// Run `apply`, then make `root` the latest. Readers never observe the
    /// root without its applied content.
    fn publish(&self, root: R, apply: Apply<'_>) -> RootResult<()> {
        let mut roots = self.roots.write().map_err(|_| RootError::Poisoned)?;
        apply()?;
        roots.push(root);
        Ok(())
    }
}

type Arena<R> = RwLock<HashMap<TreeId, Arc<RootSlot<R>>>>;

/// An in-memory implementation of [`RootLog`].
pub struct InMemoryRootLog {
    logs: Arena<SignedLogRoot>,
    maps: Arena<SignedMapRoot>,
    clock: Arc<dyn Clock>,
    max_sign_attempts: u32,
}

impl InMemoryRootLog {
    /// Create an empty root log. A failed signature is retried until
    /// `max_sign_attempts` attempts have been made (at least one).
    pub fn new(clock: Arc<dyn Clock>, max_sign_attempts: u32) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            maps: RwLock::new(HashMap::new()),
            clock,
            max_sign_attempts: max_sign_attempts.max(1),
        }
    }

    fn sign(
        &self,
        tree: &Tree,
        revision: i64,
        message: &[u8],
        signer: &dyn RootSigner,
    ) -> RootResult<DigitallySigned> {
        let mut attempt = 1;
        let signature = loop {
            match signer.sign(message) {
                Ok(signature) => break signature,
                Err(e) if e.is_retryable() && attempt < self.max_sign_attempts => {
                    warn!(
                        tree_id = %tree.tree_id,
                        revision,
                        attempt,
                        error = %e,
                        "signer unavailable, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    warn!(tree_id = %tree.tree_id, revision, attempt, error = %e, "signing failed");
                    return Err(e.into());
                }
            }
        };

        if signature.signature.is_empty() {
            return Err(RootError::MalformedSignature("signer returned an empty signature".into()));
        }
        if signature.cipher_suite != tree.signature_cipher_suite {
            return Err(RootError::MalformedSignature(format!(
                "signer used {}, tree declares {}",
                signature.cipher_suite, tree.signature_cipher_suite
            )));
        }
        Ok(signature)
    }
}

fn check_type(tree: &Tree, expected: TreeType) -> RootResult<()> {
    if tree.tree_type != expected {
        return Err(RootError::WrongTreeType {
            tree_id: tree.tree_id,
            expected,
            found: tree.tree_type,
        });
    }
    hasher_for(tree.hash_strategy)?;
    Ok(())
}

/// Revision and timestamp of the root following `previous`.
///
/// `now` must not be behind the clock reading of the previous commit
/// (`last_reading`, or the previous root's timestamp when unknown). A clock
/// that has not moved since then stamps one nanosecond past the previous
/// root.
fn stamp<R: Committed>(
    tree_id: TreeId,
    previous: Option<&R>,
    last_reading: Option<Timestamp>,
    now: Timestamp,
) -> RootResult<(i64, Timestamp)> {
    let Some(prev) = previous else {
        return Ok((1, now));
    };
    let floor = last_reading.unwrap_or(prev.timestamp());
    if now < floor {
        return Err(RootError::Monotonicity {
            tree_id,
            reason: format!(
                "clock reads {now}, behind {floor} at revision {}",
                prev.revision()
            ),
        });
    }
    let revision = prev.revision().checked_add(1).ok_or_else(|| RootError::Monotonicity {
        tree_id,
        reason: "revision space exhausted".into(),
    })?;
    Ok((revision, now.max(prev.timestamp().next())))
}

fn slot<R>(arena: &Arena<R>, tree_id: TreeId) -> RootResult<Option<Arc<RootSlot<R>>>> {
    let slots = arena.read().map_err(|_| RootError::Poisoned)?;
    Ok(slots.get(&tree_id).cloned())
}

fn slot_or_insert<R>(arena: &Arena<R>, tree_id: TreeId) -> RootResult<Arc<RootSlot<R>>> {
    if let Some(existing) = slot(arena, tree_id)? {
        return Ok(existing);
    }
    let mut slots = arena.write().map_err(|_| RootError::Poisoned)?;
    Ok(Arc::clone(slots.entry(tree_id).or_default()))
}

fn latest<R: Committed>(arena: &Arena<R>, tree_id: TreeId) -> RootResult<R> {
    debug!(tree_id = %tree_id, "latest root");
    slot(arena, tree_id)?
        .map(|s| s.latest())
        .transpose()?
        .flatten()
        .ok_or(RootError::NoRoots(tree_id))
}

fn at_revision<R: Committed>(arena: &Arena<R>, tree_id: TreeId, revision: i64) -> RootResult<R> {
    debug!(tree_id = %tree_id, revision, "root at revision");
    slot(arena, tree_id)?
        .map(|s| s.at(revision))
        .transpose()?
        .flatten()
        .ok_or(RootError::RevisionNotFound { tree_id, revision })
}

fn history<R: Committed>(arena: &Arena<R>, tree_id: TreeId) -> RootResult<Vec<R>> {
    match slot(arena, tree_id)? {
        Some(s) => Ok(s.roots.read().map_err(|_| RootError::Poisoned)?.clone()),
        None => Ok(Vec::new()),
    }
}

impl RootLog for InMemoryRootLog {
    fn commit_log_with(
        &self,
        tree: &Tree,
        content: LogContent,
        signer: &dyn RootSigner,
        apply: Apply<'_>,
    ) -> RootResult<SignedLogRoot> {
        check_type(tree, TreeType::Log)?;
        let slot = slot_or_insert(&self.logs, tree.tree_id)?;
        let mut last_reading = slot.commit.lock().map_err(|_| RootError::Poisoned)?;

        let previous = slot.latest()?;
        let now = self.clock.now();
        let (revision, timestamp) = stamp(tree.tree_id, previous.as_ref(), *last_reading, now)?;
        if let Some(prev) = &previous {
            if content.tree_size < prev.tree_size {
                return Err(RootError::Monotonicity {
                    tree_id: tree.tree_id,
                    reason: format!(
                        "tree size {} is below {} at revision {}",
                        content.tree_size, prev.tree_size, prev.tree_revision
                    ),
                });
            }
        }

        let root = LogRoot {
            log_id: tree.tree_id,
            tree_revision: revision,
            tree_size: content.tree_size,
            root_hash: content.root_hash,
            timestamp_nanos: timestamp,
        };
        let signature = self.sign(tree, revision, &root.canonical_bytes()?, signer)?;
        let signed = root.into_signed(signature);
        slot.publish(signed.clone(), apply)?;
        *last_reading = Some(now);

        info!(
            tree_id = %tree.tree_id,
            revision,
            tree_size = signed.tree_size,
            root_hash = %hex::encode(&signed.root_hash),
            "committed log root"
        );
        Ok(signed)
    }

    fn commit_map_with(
        &self,
        tree: &Tree,
        content: MapContent,
        signer: &dyn RootSigner,
        apply: Apply<'_>,
    ) -> RootResult<SignedMapRoot> {
        check_type(tree, TreeType::Map)?;
        let slot = slot_or_insert(&self.maps, tree.tree_id)?;
        let mut last_reading = slot.commit.lock().map_err(|_| RootError::Poisoned)?;

        let previous = slot.latest()?;
        let now = self.clock.now();
        let (revision, timestamp) = stamp(tree.tree_id, previous.as_ref(), *last_reading, now)?;

        let root = MapRoot {
            map_id: tree.tree_id,
            map_revision: revision,
            root_hash: content.root_hash,
            timestamp_nanos: timestamp,
            metadata: content.metadata,
        };
        let signature = self.sign(tree, revision, &root.canonical_bytes()?, signer)?;
        let signed = root.into_signed(signature);
        slot.publish(signed.clone(), apply)?;
        *last_reading = Some(now);

        info!(
            tree_id = %tree.tree_id,
            revision,
            root_hash = %hex::encode(&signed.root_hash),
            "committed map root"
        );
        Ok(signed)
    }

    fn latest_log_root(&self, tree_id: TreeId) -> RootResult<SignedLogRoot> {
        latest(&self.logs, tree_id)
    }

    fn log_root_at(&self, tree_id: TreeId, revision: i64) -> RootResult<SignedLogRoot> {
        at_revision(&self.logs, tree_id, revision)
    }

    fn log_roots(&self, tree_id: TreeId) -> RootResult<Vec<SignedLogRoot>> {
        history(&self.logs, tree_id)
    }

    fn latest_map_root(&self, tree_id: TreeId) -> RootResult<SignedMapRoot> {
        latest(&self.maps, tree_id)
    }

    fn map_root_at(&self, tree_id: TreeId, revision: i64) -> RootResult<SignedMapRoot> {
        at_revision(&self.maps, tree_id, revision)
    }

    fn map_roots(&self, tree_id: TreeId) -> RootResult<Vec<SignedMapRoot>> {
        history(&self.maps, tree_id)
    }

    fn last_commit_time(&self, tree_id: TreeId) -> RootResult<Option<Timestamp>> {
        if let Some(s) = slot(&self.logs, tree_id)? {
            if let Some(root) = s.latest()? {
                return Ok(Some(root.timestamp()));
            }
        }
        if let Some(s) = slot(&self.maps, tree_id)? {
            if let Some(root) = s.latest()? {
                return Ok(Some(root.timestamp()));
            }
        }
        Ok(None)
    }

    fn purge(&self, tree_id: TreeId) -> RootResult<bool> {
        let logs = self
            .logs
            .write()
            .map_err(|_| RootError::Poisoned)?
            .remove(&tree_id)
            .is_some();
        let maps = self
            .maps
            .write()
            .map_err(|_| RootError::Poisoned)?
            .remove(&tree_id)
            .is_some();
        if logs || maps {
            info!(tree_id = %tree_id, "purged root history");
        }
        Ok(logs || maps)
    }
}
