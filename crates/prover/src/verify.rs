//! Local proof verification against raw verifying keys.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use thiserror::Error;

use crate::oracle::CircuitId;

/// Errors during verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Verification failed: {0}")]
    Verification(String),
    #[error("Invalid public inputs")]
    InvalidInputs,
}

/// Verify a proof of `circuit` with its public inputs in circuit order.
pub fn verify_proof(
    circuit: CircuitId,
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, VerifyError> {
    if public_inputs.len() != circuit.public_input_count() {
        return Err(VerifyError::InvalidInputs);
    }

    Groth16::<Bn254>::verify(vk, public_inputs, proof)
        .map_err(|e| VerifyError::Verification(e.to_string()))
}

/// Verify a TestCircuit proof (11 public inputs)
pub fn verify_test(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, VerifyError> {
    verify_proof(CircuitId::Test, vk, proof, public_inputs)
}

/// Verify a GradeClaimCircuit proof (6 public inputs)
pub fn verify_grade_claim(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, VerifyError> {
    verify_proof(CircuitId::GradeClaim, vk, proof, public_inputs)
}

/// Verify a CredentialOwnershipCircuit proof (4 public inputs)
pub fn verify_ownership(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, VerifyError> {
    verify_proof(CircuitId::CredentialOwnership, vk, proof, public_inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prove::{prove_grade_claim, GradeClaim};
    use crate::setup::setup_grade_claim;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use qualified_circuits::{
        grade_commitment, CircuitShape, Identity, IncrementalMerkleTree, MembershipWitness,
        PoseidonHasher,
    };

    const SHAPE: CircuitShape = CircuitShape {
        test_height: 2,
        tree_depth: 4,
    };

    fn claim_proof(threshold: u64) -> (crate::setup::CircuitKeyPair, crate::prove::ProofWithInputs) {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        let keys = setup_grade_claim(&mut rng, &hasher, SHAPE).unwrap();

        let identity = Identity::new(Fr::from(12u64), Fr::from(34u64));
        let mut tree = IncrementalMerkleTree::for_group(hasher.clone(), 4, 2, 0).unwrap();
        tree.insert(grade_commitment(&hasher, identity.commitment(&hasher), 240))
            .unwrap();

        let proof = prove_grade_claim(
            &keys.proving_key,
            &hasher,
            SHAPE,
            identity,
            &MembershipWitness::Group(&tree),
            GradeClaim {
                weighted_grade: 240,
                grade_threshold: threshold,
                n_questions: 3,
                external_nullifier: Fr::from(2u64),
                signal_hash: Fr::from(77u64),
            },
        )
        .unwrap();
        (keys, proof)
    }

    #[test]
    fn test_verify_grade_claim() {
        let (keys, proof) = claim_proof(80);

        assert!(verify_grade_claim(&keys.verifying_key, &proof.proof, &proof.public_inputs).unwrap());
    }

    #[test]
    fn test_verify_raised_threshold_fails() {
        let (keys, proof) = claim_proof(80);

        // Claiming 81 with a proof for 80
        let mut inputs = proof.public_inputs.clone();
        inputs[4] = Fr::from(81u64);
        assert!(!verify_grade_claim(&keys.verifying_key, &proof.proof, &inputs).unwrap());
    }

    #[test]
    fn test_verify_wrong_input_count() {
        let (keys, proof) = claim_proof(80);

        assert!(matches!(
            verify_ownership(&keys.verifying_key, &proof.proof, &proof.public_inputs),
            Err(VerifyError::InvalidInputs)
        ));
    }
}
