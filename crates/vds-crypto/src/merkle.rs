use std::collections::BTreeMap;

use crate::hasher::TreeHasher;

/// Depth of the sparse map tree, in bits of key index.
pub const MAP_DEPTH: usize = 256;

/// RFC 6962 Merkle Tree Hash over a list of leaf hashes.
///
/// Leaves are split at the largest power of two smaller than the leaf count,
/// as in RFC 6962 section 2.1. The tree is summarized as a compact range: one
/// perfect-subtree hash per set bit of the leaf count, largest first. Appends
/// are O(log n) and a clone can be extended to compute a prospective root
/// without touching the original.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MerkleTree {
    size: u64,
    /// Perfect subtree roots, largest (leftmost) first.
    frontier: Vec<Vec<u8>>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from leaf hashes.
    pub fn from_leaf_hashes(hasher: &dyn TreeHasher, leaf_hashes: &[Vec<u8>]) -> Self {
        let mut tree = Self::new();
        for leaf in leaf_hashes {
            tree.append(hasher, leaf.clone());
        }
        tree
    }

    /// Append one leaf hash.
    pub fn append(&mut self, hasher: &dyn TreeHasher, leaf_hash: Vec<u8>) {
        let mut hash = leaf_hash;
        let mut size = self.size;
        while size & 1 == 1 {
            // A set low bit means the newest perfect subtree has the same
            // height as `hash`; merge them.
            match self.frontier.pop() {
                Some(left) => hash = hasher.node_hash(&left, &hash),
                None => break,
            }
            size >>= 1;
        }
        self.frontier.push(hash);
        self.size += 1;
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> u64 {
        self.size
    }

    /// Root hash; the strategy's empty hash for a tree with no leaves.
    pub fn root(&self, hasher: &dyn TreeHasher) -> Vec<u8> {
        let mut subtrees = self.frontier.iter().rev();
        let Some(smallest) = subtrees.next() else {
            return hasher.empty_hash();
        };
        subtrees.fold(smallest.clone(), |acc, left| hasher.node_hash(left, &acc))
    }
}

/// Reference RFC 6962 root computed by direct recursion.
pub fn merkle_tree_hash(hasher: &dyn TreeHasher, leaf_hashes: &[Vec<u8>]) -> Vec<u8> {
    match leaf_hashes.len() {
        0 => hasher.empty_hash(),
        1 => leaf_hashes[0].clone(),
        n => {
            let k = split_point(n);
            let left = merkle_tree_hash(hasher, &leaf_hashes[..k]);
            let right = merkle_tree_hash(hasher, &leaf_hashes[k..]);
            hasher.node_hash(&left, &right)
        }
    }
}

fn split_point(n: usize) -> usize {
    let mut k = 1;
    while k << 1 < n {
        k <<= 1;
    }
    k
}

/// Sparse Merkle tree over 256-bit key indices.
///
/// Absent leaves hash to the strategy's empty hash; an empty subtree of
/// height `h + 1` hashes to `node(empty_h, empty_h)`. Only populated paths
/// are recomputed.
pub struct SparseMerkleTree<'h> {
    hasher: &'h dyn TreeHasher,
    /// `empty[h]` is the root of an empty subtree of height `h`.
    empty: Vec<Vec<u8>>,
}

impl<'h> SparseMerkleTree<'h> {
    pub fn new(hasher: &'h dyn TreeHasher) -> Self {
        let mut empty = Vec::with_capacity(MAP_DEPTH + 1);
        empty.push(hasher.empty_hash());
        for h in 0..MAP_DEPTH {
            let below = &empty[h];
            let next = hasher.node_hash(below, below);
            empty.push(next);
        }
        Self { hasher, empty }
    }

    /// Root of a map whose populated leaves are `leaves` (index → leaf hash).
    pub fn root(&self, leaves: &BTreeMap<[u8; 32], Vec<u8>>) -> Vec<u8> {
        let sorted: Vec<(&[u8; 32], &Vec<u8>)> = leaves.iter().collect();
        self.subtree(&sorted, 0)
    }

    /// Root of the completely empty map.
    pub fn empty_root(&self) -> Vec<u8> {
        self.empty[MAP_DEPTH].clone()
    }

    fn subtree(&self, leaves: &[(&[u8; 32], &Vec<u8>)], depth: usize) -> Vec<u8> {
        if leaves.is_empty() {
            return self.empty[MAP_DEPTH - depth].clone();
        }
        if depth == MAP_DEPTH {
            return leaves[0].1.clone();
        }
        let split = leaves.partition_point(|(index, _)| !bit(index, depth));
        let left = self.subtree(&leaves[..split], depth + 1);
        let right = self.subtree(&leaves[split..], depth + 1);
        self.hasher.node_hash(&left, &right)
    }
}

fn bit(index: &[u8; 32], depth: usize) -> bool {
    (index[depth / 8] >> (7 - depth % 8)) & 1 == 1
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vds_types::HashStrategy;

    use super::*;
    use crate::hasher::hasher_for;

    fn rfc() -> &'static dyn TreeHasher {
        hasher_for(HashStrategy::Rfc6962Sha256).unwrap()
    }

    fn map_hasher() -> &'static dyn TreeHasher {
        hasher_for(HashStrategy::TestMapHasher).unwrap()
    }

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| rfc().leaf_hash(&[i as u8])).collect()
    }

    #[test]
    fn empty_tree_has_empty_hash() {
        let tree = MerkleTree::new();
        assert_eq!(tree.root(rfc()), rfc().empty_hash());
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn single_leaf_is_root() {
        let l = leaves(1);
        let tree = MerkleTree::from_leaf_hashes(rfc(), &l);
        assert_eq!(tree.root(rfc()), l[0]);
    }

    #[test]
    fn three_leaves_split_at_two() {
        let h = rfc();
        let l = leaves(3);
        let expected = h.node_hash(&h.node_hash(&l[0], &l[1]), &l[2]);
        assert_eq!(MerkleTree::from_leaf_hashes(h, &l).root(h), expected);
        assert_eq!(merkle_tree_hash(h, &l), expected);
    }

    #[test]
    fn five_leaves_split_at_four() {
        let h = rfc();
        let l = leaves(5);
        let left = h.node_hash(&h.node_hash(&l[0], &l[1]), &h.node_hash(&l[2], &l[3]));
        let expected = h.node_hash(&left, &l[4]);
        assert_eq!(MerkleTree::from_leaf_hashes(h, &l).root(h), expected);
    }

    #[test]
    fn clone_extends_without_touching_original() {
        let h = rfc();
        let original = MerkleTree::from_leaf_hashes(h, &leaves(3));
        let before = original.root(h);
        let mut prospective = original.clone();
        prospective.append(h, h.leaf_hash(b"next"));
        assert_eq!(original.root(h), before);
        assert_eq!(prospective.leaf_count(), 4);
        assert_ne!(prospective.root(h), before);
    }

    #[test]
    fn split_point_is_largest_power_below() {
        assert_eq!(split_point(2), 1);
        assert_eq!(split_point(3), 2);
        assert_eq!(split_point(4), 2);
        assert_eq!(split_point(5), 4);
        assert_eq!(split_point(9), 8);
    }

    #[test]
    fn empty_map_root_is_stable() {
        let smt = SparseMerkleTree::new(map_hasher());
        assert_eq!(smt.root(&BTreeMap::new()), smt.empty_root());
    }

    #[test]
    fn map_root_depends_on_contents() {
        let h = map_hasher();
        let smt = SparseMerkleTree::new(h);
        let mut leaves = BTreeMap::new();
        leaves.insert(h.key_index(b"alice"), h.leaf_hash(b"1"));
        let one = smt.root(&leaves);
        assert_ne!(one, smt.empty_root());

        leaves.insert(h.key_index(b"bob"), h.leaf_hash(b"2"));
        let two = smt.root(&leaves);
        assert_ne!(one, two);

        leaves.insert(h.key_index(b"bob"), h.leaf_hash(b"3"));
        assert_ne!(smt.root(&leaves), two);
    }

    #[test]
    fn single_leaf_map_path() {
        let h = map_hasher();
        let smt = SparseMerkleTree::new(h);
        let index = [0u8; 32];
        let leaf = h.leaf_hash(b"v");
        let mut leaves = BTreeMap::new();
        leaves.insert(index, leaf.clone());

        // All-zero index: the leaf is the leftmost child at every level.
        let mut expected = leaf;
        for height in 0..MAP_DEPTH {
            expected = h.node_hash(&expected, &smt.empty[height]);
        }
        assert_eq!(smt.root(&leaves), expected);
    }

    #[test]
    fn bit_order_is_msb_first() {
        let mut index = [0u8; 32];
        index[0] = 0b1000_0000;
        assert!(bit(&index, 0));
        assert!(!bit(&index, 1));
        index[1] = 0b0000_0001;
        assert!(bit(&index, 15));
    }

    proptest! {
        #[test]
        fn compact_range_matches_recursive_hash(n in 0usize..70) {
            let l = leaves(n);
            let h = rfc();
            prop_assert_eq!(MerkleTree::from_leaf_hashes(h, &l).root(h), merkle_tree_hash(h, &l));
        }

        #[test]
        fn map_root_ignores_insertion_order(keys in proptest::collection::vec(any::<u16>(), 1..12)) {
            let h = map_hasher();
            let smt = SparseMerkleTree::new(h);
            let forward: BTreeMap<_, _> = keys
                .iter()
                .map(|k| (h.key_index(&k.to_be_bytes()), h.leaf_hash(&k.to_le_bytes())))
                .collect();
            let reverse: BTreeMap<_, _> = keys
                .iter()
                .rev()
                .map(|k| (h.key_index(&k.to_be_bytes()), h.leaf_hash(&k.to_le_bytes())))
                .collect();
            prop_assert_eq!(smt.root(&forward), smt.root(&reverse));
        }
    }
}
