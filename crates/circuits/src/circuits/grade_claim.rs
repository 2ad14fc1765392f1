//! Grade claim circuit.
//!
//! Proves that the prover owns a grade commitment in a grade tree whose
//! weighted grade reaches `grade_threshold * n_questions`, without revealing
//! the grade.
//!
//! Public inputs, in order:
//! - grade_tree_root
//! - nullifier_hash: H(external_nullifier, nullifier)
//! - signal_hash
//! - external_nullifier
//! - grade_threshold
//! - n_questions

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::CircuitShape;
use crate::identity::{grade_commitment, Identity};
use crate::merkle::{compute_root_from_path, MerkleError, MerkleProof, MerkleProofVar};
use crate::poseidon::{poseidon_hash_two_var, PoseidonHasher};
use crate::range_check::{enforce_geq, enforce_u32_range};
use crate::signal::bind_signal_var;

/// Grade claim circuit.
#[derive(Clone)]
pub struct GradeClaimCircuit {
    hasher: PoseidonHasher,
    shape: CircuitShape,

    // Public inputs
    pub grade_tree_root: Option<Fr>,
    pub nullifier_hash: Option<Fr>,
    pub signal_hash: Option<Fr>,
    pub external_nullifier: Option<Fr>,
    pub grade_threshold: Option<u64>,
    pub n_questions: Option<u64>,

    // Witnesses
    pub identity: Option<Identity>,
    pub weighted_grade: Option<u64>,
    pub grade_proof: Option<MerkleProof>,
}

impl GradeClaimCircuit {
    /// Create a circuit with dummy assignments, for setup and constraint counting.
    pub fn empty(hasher: PoseidonHasher, shape: CircuitShape) -> Self {
        let depth = shape.tree_depth;
        let dummy_proof = MerkleProof::new(
            Fr::from(0u64),
            Fr::from(0u64),
            vec![Fr::from(0u64); depth],
            vec![false; depth],
        );

        Self {
            hasher,
            shape,
            grade_tree_root: Some(Fr::from(0u64)),
            nullifier_hash: Some(Fr::from(0u64)),
            signal_hash: Some(Fr::from(0u64)),
            external_nullifier: Some(Fr::from(0u64)),
            grade_threshold: Some(0),
            n_questions: Some(1),
            identity: Some(Identity::new(Fr::from(0u64), Fr::from(0u64))),
            weighted_grade: Some(0),
            grade_proof: Some(dummy_proof),
        }
    }

    /// Create a circuit with all witnesses.
    ///
    /// `grade_proof` must prove the commitment of `identity` and
    /// `weighted_grade`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hasher: PoseidonHasher,
        shape: CircuitShape,
        identity: Identity,
        weighted_grade: u64,
        grade_proof: MerkleProof,
        grade_threshold: u64,
        n_questions: u64,
        external_nullifier: Fr,
        signal_hash: Fr,
    ) -> Result<Self, MerkleError> {
        let commitment = grade_commitment(&hasher, identity.commitment(&hasher), weighted_grade);
        if grade_proof.leaf != commitment || !grade_proof.verify(&hasher, shape.tree_depth)? {
            return Err(MerkleError::LeafNotFound);
        }

        Ok(Self {
            grade_tree_root: Some(grade_proof.root),
            nullifier_hash: Some(identity.nullifier_hash(&hasher, external_nullifier)),
            signal_hash: Some(signal_hash),
            external_nullifier: Some(external_nullifier),
            grade_threshold: Some(grade_threshold),
            n_questions: Some(n_questions),
            identity: Some(identity),
            weighted_grade: Some(weighted_grade),
            grade_proof: Some(grade_proof),
            hasher,
            shape,
        })
    }

    /// Public inputs in circuit order, if fully assigned.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(vec![
            self.grade_tree_root?,
            self.nullifier_hash?,
            self.signal_hash?,
            self.external_nullifier?,
            Fr::from(self.grade_threshold?),
            Fr::from(self.n_questions?),
        ])
    }
}

impl ConstraintSynthesizer<Fr> for GradeClaimCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let config = self.hasher.config();
        let depth = self.shape.tree_depth;

        // === Allocate public inputs ===
        let root_var = FpVar::new_input(cs.clone(), || {
            self.grade_tree_root.ok_or(SynthesisError::AssignmentMissing)
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
        let threshold_var = FpVar::new_input(cs.clone(), || {
            self.grade_threshold
                .map(Fr::from)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let n_questions_var = FpVar::new_input(cs.clone(), || {
            self.n_questions
                .map(Fr::from)
                .ok_or(SynthesisError::AssignmentMissing)
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
        let weighted_grade_var = FpVar::new_witness(cs.clone(), || {
            self.weighted_grade
                .map(Fr::from)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let grade_proof = self
            .grade_proof
            .as_ref()
            .ok_or(SynthesisError::AssignmentMissing)?;
        if grade_proof.depth() != depth {
            return Err(SynthesisError::Unsatisfiable);
        }
        let proof_var = MerkleProofVar::new_witness(cs.clone(), grade_proof)?;

        // === Constraint 1: Grade commitment is in the tree ===
        let identity_commitment =
            poseidon_hash_two_var(cs.clone(), &config, &nullifier_var, &trapdoor_var)?;
        let commitment =
            poseidon_hash_two_var(cs.clone(), &config, &identity_commitment, &weighted_grade_var)?;
        let computed_root = compute_root_from_path(cs.clone(), &config, &commitment, &proof_var)?;
        computed_root.enforce_equal(&root_var)?;

        // === Constraint 2: Nullifier hash ===
        let computed_nullifier_hash =
            poseidon_hash_two_var(cs.clone(), &config, &external_nullifier_var, &nullifier_var)?;
        computed_nullifier_hash.enforce_equal(&nullifier_hash_var)?;

        // === Constraint 3: weighted_grade >= grade_threshold * n_questions ===
        enforce_u32_range(cs.clone(), &weighted_grade_var)?;
        enforce_u32_range(cs.clone(), &threshold_var)?;
        enforce_u32_range(cs.clone(), &n_questions_var)?;
        let required = &threshold_var * &n_questions_var;
        enforce_geq(cs.clone(), &weighted_grade_var, &required)?;

        // === Constraint 4: Signal ===
        bind_signal_var(&signal_hash_var)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::IncrementalMerkleTree;
    use ark_relations::r1cs::ConstraintSystem;

    const SHAPE: CircuitShape = CircuitShape {
        test_height: 2,
        tree_depth: 4,
    };

    fn claim(weighted_grade: u64, threshold: u64) -> GradeClaimCircuit {
        let hasher = PoseidonHasher::new();
        let identity = Identity::new(Fr::from(3u64), Fr::from(4u64));
        let commitment = grade_commitment(&hasher, identity.commitment(&hasher), weighted_grade);

        let mut tree = IncrementalMerkleTree::for_group(hasher.clone(), SHAPE.tree_depth, 1, 0).unwrap();
        tree.insert(Fr::from(77u64)).unwrap();
        tree.insert(commitment).unwrap();
        let proof = tree.generate_proof(1).unwrap();

        GradeClaimCircuit::new(
            hasher,
            SHAPE,
            identity,
            weighted_grade,
            proof,
            threshold,
            3,
            Fr::from(2u64),
            Fr::from(999u64),
        )
        .unwrap()
    }

    #[test]
    fn test_claim_at_threshold_satisfied() {
        // 150 / 3 = 50
        let circuit = claim(150, 50);

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
        println!("Grade claim constraints: {}", cs.num_constraints());
    }

    #[test]
    fn test_claim_above_grade_unsatisfied() {
        let circuit = claim(150, 51);

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_wrong_nullifier_hash_unsatisfied() {
        let mut circuit = claim(150, 10);
        circuit.nullifier_hash = Some(Fr::from(1u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_proof_for_other_commitment_rejected() {
        let hasher = PoseidonHasher::new();
        let identity = Identity::new(Fr::from(3u64), Fr::from(4u64));
        let mut tree = IncrementalMerkleTree::for_group(hasher.clone(), SHAPE.tree_depth, 1, 0).unwrap();
        tree.insert(Fr::from(77u64)).unwrap();

        let result = GradeClaimCircuit::new(
            hasher,
            SHAPE,
            identity,
            150,
            tree.generate_proof(0).unwrap(),
            50,
            3,
            Fr::from(2u64),
            Fr::from(0u64),
        );
        assert!(matches!(result, Err(MerkleError::LeafNotFound)));
    }
}
