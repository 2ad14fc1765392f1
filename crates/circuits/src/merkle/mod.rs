//! Incremental Merkle trees for credential groups.
//!
//! This module provides:
//! - Native append/update trees with O(depth) root maintenance
//! - Merkle proofs and the `MembershipWitness` variant consumed by provers
//! - Fixed-size leaf-array roots used by the grading engine
//! - In-circuit path verification gadgets

mod gadgets;
mod leaves;
mod proof;
mod tree;

#[cfg(test)]
mod tests;

use thiserror::Error;

pub use gadgets::{
    compute_root_from_path, compute_root_with_bits, index_to_bits, root_from_leaves_var,
    MerkleProofVar,
};
pub use leaves::root_from_leaves;
pub use proof::{MembershipWitness, MerkleProof};
pub use tree::{group_seed, IncrementalMerkleTree, DEFAULT_DEPTH, MAX_DEPTH};

/// Errors raised by tree operations and proof checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("tree depth {depth} outside supported range 1..={max}")]
    InvalidDepth { depth: usize, max: usize },
    #[error("tree is full: capacity {capacity}")]
    TreeFull { capacity: u64 },
    #[error("leaf index {index} out of range (tree has {len} leaves)")]
    IndexOutOfRange { index: u64, len: u64 },
    #[error("proof has {siblings} siblings and {path_indices} path indices, expected {expected}")]
    ProofLengthMismatch {
        siblings: usize,
        path_indices: usize,
        expected: usize,
    },
    #[error("leaf is not a member of the group")]
    LeafNotFound,
    #[error("{count} leaves do not fit in a tree of height {height}")]
    TooManyLeaves { count: usize, height: usize },
}
