//! Incremental Merkle tree native implementation.
//!
//! Leaves are appended left to right. Every level keeps only the nodes that
//! cover at least one inserted leaf; missing nodes are the precomputed empty
//! subtree hashes, so inserting or updating touches a single root path.

use ark_bn254::Fr;

use super::proof::MerkleProof;
use super::MerkleError;
use crate::field::keccak_to_field;
use crate::poseidon::PoseidonHasher;

/// Default tree depth (16 levels = 65,536 members)
pub const DEFAULT_DEPTH: usize = 16;

/// Deepest supported tree
pub const MAX_DEPTH: usize = 32;

/// Zero seed for one group: keccak256(group_id as 32-byte BE || tag) >> 8.
pub fn group_seed(group_id: u64, tag: u8) -> Fr {
    let mut preimage = [0u8; 33];
    preimage[24..32].copy_from_slice(&group_id.to_be_bytes());
    preimage[32] = tag;
    keccak_to_field(&preimage)
}

/// Append-only Merkle tree of fixed depth.
#[derive(Clone, Debug)]
pub struct IncrementalMerkleTree {
    hasher: PoseidonHasher,

    /// Number of levels between the leaves and the root
    depth: usize,

    /// zeroes[0] = empty leaf, zeroes[i] = H(zeroes[i-1], zeroes[i-1])
    zeroes: Vec<Fr>,

    /// nodes[0] = leaves, nodes[depth] = [root] once non-empty
    nodes: Vec<Vec<Fr>>,
}

impl IncrementalMerkleTree {
    /// Create an empty tree whose empty leaf is H(seed).
    pub fn new(hasher: PoseidonHasher, depth: usize, seed: Fr) -> Result<Self, MerkleError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(MerkleError::InvalidDepth {
                depth,
                max: MAX_DEPTH,
            });
        }

        let mut zeroes = Vec::with_capacity(depth + 1);
        let mut zero = hasher.hash_one(seed);
        zeroes.push(zero);
        for _ in 0..depth {
            zero = hasher.hash_two(zero, zero);
            zeroes.push(zero);
        }

        Ok(Self {
            hasher,
            depth,
            zeroes,
            nodes: vec![Vec::new(); depth + 1],
        })
    }

    /// Create the empty tree of a numbered group.
    pub fn for_group(
        hasher: PoseidonHasher,
        depth: usize,
        group_id: u64,
        tag: u8,
    ) -> Result<Self, MerkleError> {
        Self::new(hasher, depth, group_seed(group_id, tag))
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Maximum number of leaves (2^depth).
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Number of inserted leaves.
    pub fn len(&self) -> usize {
        self.nodes[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }

    pub fn root(&self) -> Fr {
        self.node(self.depth, 0)
    }

    /// Value of an empty leaf in this tree.
    pub fn zero_leaf(&self) -> Fr {
        self.zeroes[0]
    }

    /// Empty subtree hashes, leaf level first.
    pub fn zeroes(&self) -> &[Fr] {
        &self.zeroes
    }

    pub fn leaves(&self) -> &[Fr] {
        &self.nodes[0]
    }

    pub fn leaf(&self, index: usize) -> Option<Fr> {
        self.nodes[0].get(index).copied()
    }

    pub fn index_of(&self, leaf: &Fr) -> Option<usize> {
        self.nodes[0].iter().position(|candidate| candidate == leaf)
    }

    /// Append a leaf and return its index.
    pub fn insert(&mut self, leaf: Fr) -> Result<usize, MerkleError> {
        let index = self.len();
        if index as u64 >= self.capacity() {
            return Err(MerkleError::TreeFull {
                capacity: self.capacity(),
            });
        }

        self.nodes[0].push(leaf);
        self.recompute_path(index);
        Ok(index)
    }

    /// Index and root that `insert(leaf)` would produce, without mutating.
    pub fn peek_insert(&self, leaf: Fr) -> Result<(usize, Fr), MerkleError> {
        let index = self.len();
        if index as u64 >= self.capacity() {
            return Err(MerkleError::TreeFull {
                capacity: self.capacity(),
            });
        }

        let siblings = self.siblings(index);
        let mut current = leaf;
        let mut position = index;
        for sibling in siblings {
            current = if position & 1 == 0 {
                self.hasher.hash_two(current, sibling)
            } else {
                self.hasher.hash_two(sibling, current)
            };
            position >>= 1;
        }

        Ok((index, current))
    }

    /// Overwrite an already inserted leaf.
    pub fn update(&mut self, index: usize, leaf: Fr) -> Result<(), MerkleError> {
        if index >= self.len() {
            return Err(MerkleError::IndexOutOfRange {
                index: index as u64,
                len: self.len() as u64,
            });
        }

        self.nodes[0][index] = leaf;
        self.recompute_path(index);
        Ok(())
    }

    /// Generate a membership proof for an inserted leaf.
    pub fn generate_proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        let leaf = self.leaf(index).ok_or(MerkleError::IndexOutOfRange {
            index: index as u64,
            len: self.len() as u64,
        })?;

        Ok(MerkleProof::new(
            self.root(),
            leaf,
            self.siblings(index),
            Self::path_indices(index, self.depth),
        ))
    }

    /// Proof for the next free slot, whose leaf is still the empty leaf.
    ///
    /// This is the witness an append proves against: the same siblings
    /// yield the old root with the empty leaf and the new root with the
    /// inserted one.
    pub fn insertion_proof(&self) -> Result<MerkleProof, MerkleError> {
        let index = self.len();
        if index as u64 >= self.capacity() {
            return Err(MerkleError::TreeFull {
                capacity: self.capacity(),
            });
        }

        Ok(MerkleProof::new(
            self.root(),
            self.zeroes[0],
            self.siblings(index),
            Self::path_indices(index, self.depth),
        ))
    }

    /// Check a proof against the current root.
    pub fn verify_proof(&self, proof: &MerkleProof) -> Result<bool, MerkleError> {
        Ok(proof.root == self.root() && proof.verify(&self.hasher, self.depth)?)
    }

    fn node(&self, level: usize, index: usize) -> Fr {
        self.nodes[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeroes[level])
    }

    fn siblings(&self, index: usize) -> Vec<Fr> {
        let mut position = index;
        (0..self.depth)
            .map(|level| {
                let sibling = self.node(level, position ^ 1);
                position >>= 1;
                sibling
            })
            .collect()
    }

    fn path_indices(index: usize, depth: usize) -> Vec<bool> {
        (0..depth).map(|level| (index >> level) & 1 == 1).collect()
    }

    /// Recompute hashes from a leaf up to the root.
    fn recompute_path(&mut self, index: usize) {
        let mut position = index;
        let mut current = self.nodes[0][index];

        for level in 0..self.depth {
            let sibling = self.node(level, position ^ 1);
            current = if position & 1 == 0 {
                self.hasher.hash_two(current, sibling)
            } else {
                self.hasher.hash_two(sibling, current)
            };

            position >>= 1;
            let parents = &mut self.nodes[level + 1];
            if position == parents.len() {
                parents.push(current);
            } else {
                parents[position] = current;
            }
        }
    }
}
