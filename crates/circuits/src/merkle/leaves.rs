//! Roots of fixed-size leaf arrays.
//!
//! Answer keys are committed as complete trees of height `test_height`: the
//! leaves are padded to `2^height` and hashed pairwise level by level.

use ark_bn254::Fr;
use rayon::prelude::*;

use super::MerkleError;
use crate::poseidon::PoseidonHasher;

/// Root of `leaves` padded with `pad` to `2^height` entries.
pub fn root_from_leaves(
    hasher: &PoseidonHasher,
    leaves: &[Fr],
    height: usize,
    pad: Fr,
) -> Result<Fr, MerkleError> {
    let width = 1usize << height;
    if leaves.len() > width {
        return Err(MerkleError::TooManyLeaves {
            count: leaves.len(),
            height,
        });
    }

    let mut level: Vec<Fr> = leaves.to_vec();
    level.resize(width, pad);

    while level.len() > 1 {
        level = level
            .par_chunks(2)
            .map(|pair| hasher.hash_two(pair[0], pair[1]))
            .collect();
    }

    Ok(level[0])
}
