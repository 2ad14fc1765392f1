//! Credential ownership circuit.
//!
//! Semaphore-style membership: the prover knows an identity whose commitment
//! is a leaf of the group, and reveals only a nullifier hash scoped to the
//! external nullifier.
//!
//! Public inputs, in order:
//! - merkle_tree_root
//! - nullifier_hash: H(external_nullifier, nullifier)
//! - signal_hash
//! - external_nullifier

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::CircuitShape;
use crate::identity::Identity;
use crate::merkle::{compute_root_from_path, MerkleError, MerkleProof, MerkleProofVar};
use crate::poseidon::{poseidon_hash_two_var, PoseidonHasher};
use crate::signal::bind_signal_var;

/// Credential ownership circuit.
#[derive(Clone)]
pub struct CredentialOwnershipCircuit {
    hasher: PoseidonHasher,
    shape: CircuitShape,

    // Public inputs
    pub merkle_tree_root: Option<Fr>,
    pub nullifier_hash: Option<Fr>,
    pub signal_hash: Option<Fr>,
    pub external_nullifier: Option<Fr>,

    // Witnesses
    pub identity: Option<Identity>,
    pub membership_proof: Option<MerkleProof>,
}

impl CredentialOwnershipCircuit {
    /// Create a circuit with dummy assignments, for setup and constraint counting.
    pub fn empty(hasher: PoseidonHasher, shape: CircuitShape) -> Self {
        let depth = shape.tree_depth;
        let zero = Fr::from(0u64);

        Self {
            hasher,
            shape,
            merkle_tree_root: Some(zero),
            nullifier_hash: Some(zero),
            signal_hash: Some(zero),
            external_nullifier: Some(zero),
            identity: Some(Identity::new(zero, zero)),
            membership_proof: Some(MerkleProof::new(
                zero,
                zero,
                vec![zero; depth],
                vec![false; depth],
            )),
        }
    }

    /// Create a circuit with all witnesses.
    pub fn new(
        hasher: PoseidonHasher,
        shape: CircuitShape,
        identity: Identity,
        membership_proof: MerkleProof,
        external_nullifier: Fr,
        signal_hash: Fr,
    ) -> Result<Self, MerkleError> {
        if membership_proof.leaf != identity.commitment(&hasher)
            || !membership_proof.verify(&hasher, shape.tree_depth)?
        {
            return Err(MerkleError::LeafNotFound);
        }

        Ok(Self {
            merkle_tree_root: Some(membership_proof.root),
            nullifier_hash: Some(identity.nullifier_hash(&hasher, external_nullifier)),
            signal_hash: Some(signal_hash),
            external_nullifier: Some(external_nullifier),
            identity: Some(identity),
            membership_proof: Some(membership_proof),
            hasher,
            shape,
        })
    }

    /// Public inputs in circuit order, if fully assigned.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(vec![
            self.merkle_tree_root?,
            self.nullifier_hash?,
            self.signal_hash?,
            self.external_nullifier?,
        ])
    }
}

impl ConstraintSynthesizer<Fr> for CredentialOwnershipCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let config = self.hasher.config();

        // === Allocate public inputs ===
        let root_var = FpVar::new_input(cs.clone(), || {
            self.merkle_tree_root.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let nullifier_hash_var = FpVar::new_input(cs.clone(), || {
            self.nullifier_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let signal_hash_var = FpVar::new_input(cs.clone(), || {
            self.signal_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let external_nullifier_var = FpVar::new_input(cs.clone(), || {
            self.external_nullifier.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // === Allocate witnesses ===
        let nullifier_var = FpVar::new_witness(cs.clone(), || {
            self.identity
                .map(|id| id.nullifier())
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let trapdoor_var = FpVar::new_witness(cs.clone(), || {
            self.identity
                .map(|id| id.trapdoor())
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let proof = self
            .membership_proof
            .as_ref()
            .ok_or(SynthesisError::AssignmentMissing)?;
        if proof.depth() != self.shape.tree_depth {
            return Err(SynthesisError::Unsatisfiable);
        }
        let proof_var = MerkleProofVar::new_witness(cs.clone(), proof)?;

        // === Constraint 1: Identity commitment is a member ===
        let identity_commitment =
            poseidon_hash_two_var(cs.clone(), &config, &nullifier_var, &trapdoor_var)?;
        let computed_root =
            compute_root_from_path(cs.clone(), &config, &identity_commitment, &proof_var)?;
        computed_root.enforce_equal(&root_var)?;

        // === Constraint 2: Nullifier hash ===
        let computed_nullifier_hash =
            poseidon_hash_two_var(cs.clone(), &config, &external_nullifier_var, &nullifier_var)?;
        computed_nullifier_hash.enforce_equal(&nullifier_hash_var)?;

        // === Constraint 3: Signal ===
        bind_signal_var(&signal_hash_var)?;

        Ok(())
    }
}
