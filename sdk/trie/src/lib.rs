//! Asset Slot Trie
//!
//! Fixed-depth sparse Merkle tree keyed by asset id. The same structure backs
//! both the ownership trie (value = owner address) and the nonce trie
//! (value = transfer counter).
//!
//! ```text
//!                      Root (level D)
//!                     /              \
//!                H(n0, n1)          H(n2, n3)
//!               /        \          /        \
//!            L(0)       L(1)     L(2)       L(3)      level 0
//!
//!   L(k)     = Poseidon(k, value, 1)       set key
//!            = 0                           unset key
//!   H(l, r)  = 0                           if l = r = 0
//!            = Poseidon(l, r)              otherwise
//! ```
//!
//! Key bit `i` (LSB first) selects the side at level `i`. Every proof carries
//! exactly `TRIE_DEPTH` siblings ordered leaf to root; an empty subtree is the
//! zero element at every level, so the empty trie has root 0.

use std::collections::{BTreeMap, HashMap};

use ark_ff::{One, Zero};
use rollup_primitives::{Fr, TRIE_CAPACITY, TRIE_DEPTH, poseidon_hash};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("key {key} out of range (capacity {capacity})")]
    KeyOutOfRange { key: u64, capacity: u64 },

    #[error("key {0} already holds an entry")]
    KeyOccupied(u64),

    #[error("key {0} has no entry")]
    KeyNotFound(u64),
}

// ============================================================================
// Hashing
// ============================================================================

/// Leaf commitment for a set key
pub fn leaf_hash(key: u64, value: Fr) -> Fr {
    poseidon_hash(&[Fr::from(key), value, Fr::one()])
}

/// Interior node; two empty children collapse to the empty node
pub fn node_hash(left: Fr, right: Fr) -> Fr {
    if left.is_zero() && right.is_zero() {
        return Fr::zero();
    }
    poseidon_hash(&[left, right])
}

/// Fold a leaf up its path to the root
pub fn compute_root(key: u64, leaf: Fr, siblings: &[Fr; TRIE_DEPTH]) -> Fr {
    let mut current = leaf;
    for (level, sibling) in siblings.iter().enumerate() {
        current = if (key >> level) & 1 == 1 {
            node_hash(*sibling, current)
        } else {
            node_hash(current, *sibling)
        };
    }
    current
}

fn check_range(key: u64) -> Result<(), TrieError> {
    if key >= TRIE_CAPACITY {
        return Err(TrieError::KeyOutOfRange {
            key,
            capacity: TRIE_CAPACITY,
        });
    }
    Ok(())
}

// ============================================================================
// Proofs
// ============================================================================

/// Authentication path for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub key: u64,
    /// Leaf to root
    pub siblings: [Fr; TRIE_DEPTH],
}

impl MerkleProof {
    /// Root implied by placing `leaf` at this proof's key
    pub fn compute_root(&self, leaf: Fr) -> Fr {
        compute_root(self.key, leaf, &self.siblings)
    }

    /// Check that `key -> value` is set under `root`
    pub fn verify_inclusion(&self, root: Fr, value: Fr) -> bool {
        self.compute_root(leaf_hash(self.key, value)) == root
    }

    /// Check that `key` is unset under `root`
    pub fn verify_exclusion(&self, root: Fr) -> bool {
        self.compute_root(Fr::zero()) == root
    }
}

/// Result of a lookup. Unset keys report `found = false` and a zero value.
#[derive(Debug, Clone)]
pub struct FindResult {
    pub key: u64,
    pub found: bool,
    pub value: Fr,
    pub proof: MerkleProof,
}

/// Result of an in-place update.
///
/// `siblings` authenticate `old_value` under `old_root` and `new_value` under
/// `new_root`; the path does not change because the key's own leaf is the
/// only node on it that is not a sibling.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub key: u64,
    pub old_root: Fr,
    pub new_root: Fr,
    pub old_value: Fr,
    pub new_value: Fr,
    pub siblings: [Fr; TRIE_DEPTH],
}

// ============================================================================
// Trie
// ============================================================================

/// In-memory sparse Merkle trie.
///
/// Only non-empty nodes are stored.
#[derive(Debug, Clone)]
pub struct SparseMerkleTrie {
    /// Set keys and their raw values
    leaves: BTreeMap<u64, Fr>,
    /// Non-empty nodes: (level, index) -> hash. Level 0 holds leaf hashes.
    nodes: HashMap<(usize, u64), Fr>,
    root: Fr,
}

impl SparseMerkleTrie {
    pub fn new() -> Self {
        Self {
            leaves: BTreeMap::new(),
            nodes: HashMap::new(),
            root: Fr::zero(),
        }
    }

    pub fn root(&self) -> Fr {
        self.root
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Raw value for a set key
    pub fn get(&self, key: u64) -> Option<Fr> {
        self.leaves.get(&key).copied()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.leaves.contains_key(&key)
    }

    /// Set keys in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u64, Fr)> + '_ {
        self.leaves.iter().map(|(k, v)| (*k, *v))
    }

    /// Set a previously unset key
    pub fn insert(&mut self, key: u64, value: Fr) -> Result<Fr, TrieError> {
        check_range(key)?;
        if self.leaves.contains_key(&key) {
            return Err(TrieError::KeyOccupied(key));
        }
        self.leaves.insert(key, value);
        self.write_leaf(key, leaf_hash(key, value));
        Ok(self.root)
    }

    /// Look up a key, with an inclusion or exclusion proof
    pub fn find(&self, key: u64) -> Result<FindResult, TrieError> {
        let proof = self.proof(key)?;
        let (found, value) = match self.leaves.get(&key) {
            Some(v) => (true, *v),
            None => (false, Fr::zero()),
        };
        Ok(FindResult {
            key,
            found,
            value,
            proof,
        })
    }

    /// Overwrite the value of a set key
    pub fn update(&mut self, key: u64, new_value: Fr) -> Result<UpdateResult, TrieError> {
        check_range(key)?;
        let old_value = self
            .leaves
            .get(&key)
            .copied()
            .ok_or(TrieError::KeyNotFound(key))?;

        let siblings = self.siblings(key);
        let old_root = self.root;

        self.leaves.insert(key, new_value);
        self.write_leaf(key, leaf_hash(key, new_value));

        Ok(UpdateResult {
            key,
            old_root,
            new_root: self.root,
            old_value,
            new_value,
            siblings,
        })
    }

    /// Authentication path for any in-range key
    pub fn proof(&self, key: u64) -> Result<MerkleProof, TrieError> {
        check_range(key)?;
        Ok(MerkleProof {
            key,
            siblings: self.siblings(key),
        })
    }

    fn node(&self, level: usize, index: u64) -> Fr {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or_else(Fr::zero)
    }

    fn set_node(&mut self, level: usize, index: u64, hash: Fr) {
        if hash.is_zero() {
            self.nodes.remove(&(level, index));
        } else {
            self.nodes.insert((level, index), hash);
        }
    }

    fn siblings(&self, key: u64) -> [Fr; TRIE_DEPTH] {
        let mut siblings = [Fr::zero(); TRIE_DEPTH];
        let mut index = key;
        for (level, slot) in siblings.iter_mut().enumerate() {
            *slot = self.node(level, index ^ 1);
            index >>= 1;
        }
        siblings
    }

    /// Write a leaf hash and recompute its path to the root
    fn write_leaf(&mut self, key: u64, leaf: Fr) {
        self.set_node(0, key, leaf);

        let mut index = key;
        let mut current = leaf;
        for level in 0..TRIE_DEPTH {
            let sibling = self.node(level, index ^ 1);
            current = if index & 1 == 1 {
                node_hash(sibling, current)
            } else {
                node_hash(current, sibling)
            };
            index >>= 1;
            self.set_node(level + 1, index, current);
        }

        self.root = current;
    }
}

impl Default for SparseMerkleTrie {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
