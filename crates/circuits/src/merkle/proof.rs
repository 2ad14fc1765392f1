//! Merkle proof structure for group membership.

use ark_bn254::Fr;

use super::tree::IncrementalMerkleTree;
use super::MerkleError;
use crate::poseidon::PoseidonHasher;

/// A Merkle proof for one leaf of an incremental tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    /// Root the proof was generated against
    pub root: Fr,

    /// Leaf value at the proven position
    pub leaf: Fr,

    /// Sibling hashes from leaf level (0) to root level (depth-1)
    pub siblings: Vec<Fr>,

    /// Direction at each level: true = current node is right child
    pub path_indices: Vec<bool>,
}

impl MerkleProof {
    pub fn new(root: Fr, leaf: Fr, siblings: Vec<Fr>, path_indices: Vec<bool>) -> Self {
        Self {
            root,
            leaf,
            siblings,
            path_indices,
        }
    }

    /// Number of levels covered by the proof.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Leaf position encoded by the path directions.
    pub fn leaf_index(&self) -> u64 {
        self.path_indices
            .iter()
            .enumerate()
            .filter(|(_, is_right)| **is_right)
            .fold(0u64, |index, (level, _)| index | (1u64 << level))
    }

    fn check_lengths(&self, expected: usize) -> Result<(), MerkleError> {
        if self.siblings.len() != expected || self.path_indices.len() != expected {
            return Err(MerkleError::ProofLengthMismatch {
                siblings: self.siblings.len(),
                path_indices: self.path_indices.len(),
                expected,
            });
        }
        Ok(())
    }

    /// Compute the root reached from `leaf` along this path.
    pub fn compute_root(&self, hasher: &PoseidonHasher, leaf: Fr) -> Result<Fr, MerkleError> {
        self.check_lengths(self.siblings.len())?;

        let mut current = leaf;
        for (sibling, &is_right) in self.siblings.iter().zip(self.path_indices.iter()) {
            current = if is_right {
                hasher.hash_two(*sibling, current)
            } else {
                hasher.hash_two(current, *sibling)
            };
        }

        Ok(current)
    }

    /// Check that the stored leaf hashes up to the stored root.
    pub fn verify(&self, hasher: &PoseidonHasher, depth: usize) -> Result<bool, MerkleError> {
        self.check_lengths(depth)?;
        Ok(self.compute_root(hasher, self.leaf)? == self.root)
    }
}

/// Source of membership paths for a prover.
///
/// Callers either hand over a whole group (the prover looks the leaf up) or a
/// proof obtained elsewhere.
#[derive(Clone, Debug)]
pub enum MembershipWitness<'a> {
    Group(&'a IncrementalMerkleTree),
    Proof(MerkleProof),
}

impl MembershipWitness<'_> {
    /// Path proving `leaf` is a member.
    pub fn membership_proof(&self, leaf: Fr) -> Result<MerkleProof, MerkleError> {
        match self {
            MembershipWitness::Group(tree) => {
                let index = tree.index_of(&leaf).ok_or(MerkleError::LeafNotFound)?;
                tree.generate_proof(index)
            }
            MembershipWitness::Proof(proof) if proof.leaf == leaf => Ok(proof.clone()),
            MembershipWitness::Proof(_) => Err(MerkleError::LeafNotFound),
        }
    }

    /// Path of the next free slot.
    pub fn insertion_proof(&self) -> Result<MerkleProof, MerkleError> {
        match self {
            MembershipWitness::Group(tree) => tree.insertion_proof(),
            MembershipWitness::Proof(proof) => Ok(proof.clone()),
        }
    }
}
