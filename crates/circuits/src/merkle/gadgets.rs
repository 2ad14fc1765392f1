//! In-circuit Merkle path verification gadgets.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_r1cs_std::{boolean::Boolean, fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use super::proof::MerkleProof;
use crate::poseidon::poseidon_hash_two_var;

/// Circuit variable representation of a Merkle proof.
#[derive(Clone)]
pub struct MerkleProofVar {
    /// Sibling hashes as circuit variables
    siblings: Vec<FpVar<Fr>>,

    /// Direction booleans as circuit variables
    path_indices: Vec<Boolean<Fr>>,
}

impl MerkleProofVar {
    /// Allocate a Merkle proof as witness variables.
    pub fn new_witness(
        cs: ConstraintSystemRef<Fr>,
        proof: &MerkleProof,
    ) -> Result<Self, SynthesisError> {
        let siblings = proof
            .siblings
            .iter()
            .map(|h| FpVar::new_witness(cs.clone(), || Ok(*h)))
            .collect::<Result<Vec<_>, _>>()?;

        let path_indices = proof
            .path_indices
            .iter()
            .map(|&b| Boolean::new_witness(cs.clone(), || Ok(b)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            siblings,
            path_indices,
        })
    }

    /// Allocate siblings only; directions come from elsewhere (e.g. a public index).
    pub fn siblings_witness(
        cs: ConstraintSystemRef<Fr>,
        siblings: Option<&[Fr]>,
        depth: usize,
    ) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
        (0..depth)
            .map(|level| {
                FpVar::new_witness(cs.clone(), || {
                    siblings
                        .and_then(|s| s.get(level).copied())
                        .ok_or(SynthesisError::AssignmentMissing)
                })
            })
            .collect()
    }

    pub fn siblings(&self) -> &[FpVar<Fr>] {
        &self.siblings
    }

    pub fn path_indices(&self) -> &[Boolean<Fr>] {
        &self.path_indices
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Compute the root from a leaf and explicit direction bits.
pub fn compute_root_with_bits(
    cs: ConstraintSystemRef<Fr>,
    config: &PoseidonConfig<Fr>,
    leaf: &FpVar<Fr>,
    siblings: &[FpVar<Fr>],
    bits: &[Boolean<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    if siblings.len() != bits.len() {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut current = leaf.clone();

    for (sibling, is_right) in siblings.iter().zip(bits.iter()) {
        // If is_right: H(sibling, current), else H(current, sibling)
        let left = is_right.select(sibling, &current)?;
        let right = is_right.select(&current, sibling)?;

        current = poseidon_hash_two_var(cs.clone(), config, &left, &right)?;
    }

    Ok(current)
}

/// Compute the root hash from a leaf and Merkle path in-circuit.
pub fn compute_root_from_path(
    cs: ConstraintSystemRef<Fr>,
    config: &PoseidonConfig<Fr>,
    leaf: &FpVar<Fr>,
    proof: &MerkleProofVar,
) -> Result<FpVar<Fr>, SynthesisError> {
    compute_root_with_bits(cs, config, leaf, &proof.siblings, &proof.path_indices)
}

/// Decompose a leaf index into `depth` little-endian direction bits.
///
/// Bits above `depth` are constrained to zero, so the index must be a valid
/// position in the tree.
pub fn index_to_bits(
    index: &FpVar<Fr>,
    depth: usize,
) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let bits = index.to_bits_le()?;
    for bit in &bits[depth..] {
        bit.enforce_equal(&Boolean::FALSE)?;
    }
    Ok(bits[..depth].to_vec())
}

/// Root of a complete tree whose leaves are all given.
pub fn root_from_leaves_var(
    cs: ConstraintSystemRef<Fr>,
    config: &PoseidonConfig<Fr>,
    leaves: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    if leaves.is_empty() || !leaves.len().is_power_of_two() {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| poseidon_hash_two_var(cs.clone(), config, &pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;
    }

    Ok(level.remove(0))
}

#[cfg(test)]
mod gadget_tests {
    use super::*;
    use crate::merkle::{root_from_leaves, IncrementalMerkleTree};
    use crate::poseidon::PoseidonHasher;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_path_matches_native() {
        let hasher = PoseidonHasher::new();
        let mut tree = IncrementalMerkleTree::new(hasher.clone(), 4, Fr::from(1u64)).unwrap();
        for i in 10..15u64 {
            tree.insert(Fr::from(i)).unwrap();
        }
        let proof = tree.generate_proof(3).unwrap();

        let cs = ConstraintSystem::<Fr>::new_ref();
        let leaf_var = FpVar::new_witness(cs.clone(), || Ok(proof.leaf)).unwrap();
        let proof_var = MerkleProofVar::new_witness(cs.clone(), &proof).unwrap();
        let root_var = FpVar::new_input(cs.clone(), || Ok(tree.root())).unwrap();

        let computed =
            compute_root_from_path(cs.clone(), &hasher.config(), &leaf_var, &proof_var).unwrap();
        computed.enforce_equal(&root_var).unwrap();

        assert_eq!(proof_var.depth(), 4);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_wrong_leaf_unsatisfied() {
        let hasher = PoseidonHasher::new();
        let mut tree = IncrementalMerkleTree::new(hasher.clone(), 4, Fr::from(1u64)).unwrap();
        tree.insert(Fr::from(10u64)).unwrap();
        let proof = tree.generate_proof(0).unwrap();

        let cs = ConstraintSystem::<Fr>::new_ref();
        let leaf_var = FpVar::new_witness(cs.clone(), || Ok(Fr::from(11u64))).unwrap();
        let proof_var = MerkleProofVar::new_witness(cs.clone(), &proof).unwrap();
        let root_var = FpVar::new_input(cs.clone(), || Ok(tree.root())).unwrap();

        let computed =
            compute_root_from_path(cs.clone(), &hasher.config(), &leaf_var, &proof_var).unwrap();
        computed.enforce_equal(&root_var).unwrap();

        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_index_bits_drive_path() {
        let hasher = PoseidonHasher::new();
        let mut tree = IncrementalMerkleTree::new(hasher.clone(), 3, Fr::from(2u64)).unwrap();
        for i in 0..6u64 {
            tree.insert(Fr::from(100 + i)).unwrap();
        }
        let proof = tree.generate_proof(5).unwrap();

        let cs = ConstraintSystem::<Fr>::new_ref();
        let index_var = FpVar::new_input(cs.clone(), || Ok(Fr::from(5u64))).unwrap();
        let bits = index_to_bits(&index_var, 3).unwrap();
        let siblings =
            MerkleProofVar::siblings_witness(cs.clone(), Some(&proof.siblings), 3).unwrap();
        let leaf_var = FpVar::new_witness(cs.clone(), || Ok(proof.leaf)).unwrap();

        let computed =
            compute_root_with_bits(cs.clone(), &hasher.config(), &leaf_var, &siblings, &bits)
                .unwrap();
        computed
            .enforce_equal(&FpVar::constant(tree.root()))
            .unwrap();

        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_index_out_of_depth_unsatisfied() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let index_var = FpVar::new_witness(cs.clone(), || Ok(Fr::from(8u64))).unwrap();
        index_to_bits(&index_var, 3).unwrap();

        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_leaf_array_root_matches_native() {
        let hasher = PoseidonHasher::new();
        let leaves: Vec<Fr> = (1..=4u64).map(Fr::from).collect();
        let expected = root_from_leaves(&hasher, &leaves, 2, Fr::from(0u64)).unwrap();

        let cs = ConstraintSystem::<Fr>::new_ref();
        let leaf_vars: Vec<FpVar<Fr>> = leaves
            .iter()
            .map(|l| FpVar::new_witness(cs.clone(), || Ok(*l)).unwrap())
            .collect();
        let root = root_from_leaves_var(cs.clone(), &hasher.config(), &leaf_vars).unwrap();
        root.enforce_equal(&FpVar::constant(expected)).unwrap();

        assert!(cs.is_satisfied().unwrap());
        assert!(root_from_leaves_var(cs, &hasher.config(), &leaf_vars[..3]).is_err());
    }
}
