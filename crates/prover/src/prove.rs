//! Proof generation for the credential circuits.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, ProvingKey};
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;

use qualified_circuits::{
    AnswerWitness, CircuitShape, CredentialOwnershipCircuit, GradeClaimCircuit, GradeResult,
    Identity, MembershipWitness, MerkleError, PoseidonHasher, TestCircuit, TestInsertion,
    TestParameters, MAX_GRADE,
};

/// Errors during proof generation
#[derive(Error, Debug)]
pub enum ProveError {
    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),
    #[error("Invalid witness: {0}")]
    InvalidWitness(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<MerkleError> for ProveError {
    fn from(err: MerkleError) -> Self {
        ProveError::InvalidWitness(err.to_string())
    }
}

/// A proof with its public inputs
#[derive(Clone, Debug, PartialEq)]
pub struct ProofWithInputs {
    pub proof: Proof<Bn254>,
    pub public_inputs: Vec<Fr>,
}

impl ProofWithInputs {
    /// Serialize proof to bytes
    pub fn serialize_proof(&self) -> Result<Vec<u8>, ProveError> {
        let mut bytes = Vec::new();
        self.proof
            .serialize_compressed(&mut bytes)
            .map_err(|e| ProveError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize public inputs to bytes (each Fr is 32 bytes)
    pub fn serialize_public_inputs(&self) -> Result<Vec<u8>, ProveError> {
        let mut bytes = Vec::new();
        for input in &self.public_inputs {
            input
                .serialize_compressed(&mut bytes)
                .map_err(|e| ProveError::Serialization(e.to_string()))?;
        }
        Ok(bytes)
    }

    /// Deserialize proof from bytes
    pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ProveError> {
        Proof::deserialize_compressed(bytes).map_err(|e| ProveError::Serialization(e.to_string()))
    }
}

/// Prove an assigned circuit.
pub fn prove_circuit<C: ConstraintSynthesizer<Fr>>(
    pk: &ProvingKey<Bn254>,
    circuit: C,
    public_inputs: Vec<Fr>,
) -> Result<ProofWithInputs, ProveError> {
    let mut rng = StdRng::from_entropy();
    let proof = Groth16::<Bn254>::prove(pk, circuit, &mut rng)
        .map_err(|e| ProveError::ProofGeneration(e.to_string()))?;

    Ok(ProofWithInputs {
        proof,
        public_inputs,
    })
}

/// Build the test circuit for an attempt.
pub fn test_circuit(
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    identity: Identity,
    params: TestParameters,
    answers: AnswerWitness,
    insertion: &TestInsertion,
) -> Result<(TestCircuit, GradeResult), ProveError> {
    Ok(TestCircuit::new(
        hasher.clone(),
        shape,
        identity,
        params,
        answers,
        insertion,
    )?)
}

/// Generate proof for TestCircuit
///
/// Returns the proof and the grading outcome it attests.
pub fn prove_test(
    pk: &ProvingKey<Bn254>,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    identity: Identity,
    params: TestParameters,
    answers: AnswerWitness,
    insertion: &TestInsertion,
) -> Result<(ProofWithInputs, GradeResult), ProveError> {
    let (circuit, result) = test_circuit(hasher, shape, identity, params, answers, insertion)?;
    let public_inputs = circuit
        .public_inputs()
        .ok_or_else(|| ProveError::InvalidWitness("unassigned test circuit".into()))?;

    Ok((prove_circuit(pk, circuit, public_inputs)?, result))
}

/// Build the ownership circuit for the member `identity` of a group.
pub fn ownership_circuit(
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    identity: Identity,
    group: &MembershipWitness<'_>,
    external_nullifier: Fr,
    signal_hash: Fr,
) -> Result<CredentialOwnershipCircuit, ProveError> {
    let proof = group.membership_proof(identity.commitment(hasher))?;
    Ok(CredentialOwnershipCircuit::new(
        hasher.clone(),
        shape,
        identity,
        proof,
        external_nullifier,
        signal_hash,
    )?)
}

/// Generate proof for CredentialOwnershipCircuit
pub fn prove_ownership(
    pk: &ProvingKey<Bn254>,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    identity: Identity,
    group: &MembershipWitness<'_>,
    external_nullifier: Fr,
    signal_hash: Fr,
) -> Result<ProofWithInputs, ProveError> {
    let circuit = ownership_circuit(hasher, shape, identity, group, external_nullifier, signal_hash)?;
    let public_inputs = circuit
        .public_inputs()
        .ok_or_else(|| ProveError::InvalidWitness("unassigned ownership circuit".into()))?;

    prove_circuit(pk, circuit, public_inputs)
}

/// Inputs of a grade claim besides the identity.
#[derive(Clone, Copy, Debug)]
pub struct GradeClaim {
    pub weighted_grade: u64,
    pub grade_threshold: u64,
    pub n_questions: u64,
    pub external_nullifier: Fr,
    pub signal_hash: Fr,
}

/// Build the grade claim circuit for a grade committed in `grade_group`.
pub fn grade_claim_circuit(
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    identity: Identity,
    grade_group: &MembershipWitness<'_>,
    claim: GradeClaim,
) -> Result<GradeClaimCircuit, ProveError> {
    if claim.grade_threshold > MAX_GRADE as u64 {
        return Err(ProveError::InvalidWitness(format!(
            "Grade threshold {} above {}",
            claim.grade_threshold, MAX_GRADE
        )));
    }
    if claim.n_questions == 0 || claim.n_questions > shape.width() as u64 {
        return Err(ProveError::InvalidWitness(format!(
            "Question count {} outside 1..={}",
            claim.n_questions,
            shape.width()
        )));
    }

    let required = claim
        .grade_threshold
        .checked_mul(claim.n_questions)
        .ok_or_else(|| ProveError::InvalidWitness("Grade threshold overflows".into()))?;
    if claim.weighted_grade < required {
        return Err(ProveError::InvalidWitness(format!(
            "Grade below threshold: have {}, need {}",
            claim.weighted_grade, required
        )));
    }

    let commitment = qualified_circuits::grade_commitment(
        hasher,
        identity.commitment(hasher),
        claim.weighted_grade,
    );
    let proof = grade_group.membership_proof(commitment)?;

    Ok(GradeClaimCircuit::new(
        hasher.clone(),
        shape,
        identity,
        claim.weighted_grade,
        proof,
        claim.grade_threshold,
        claim.n_questions,
        claim.external_nullifier,
        claim.signal_hash,
    )?)
}

/// Generate proof for GradeClaimCircuit
pub fn prove_grade_claim(
    pk: &ProvingKey<Bn254>,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    identity: Identity,
    grade_group: &MembershipWitness<'_>,
    claim: GradeClaim,
) -> Result<ProofWithInputs, ProveError> {
    let circuit = grade_claim_circuit(hasher, shape, identity, grade_group, claim)?;
    let public_inputs = circuit
        .public_inputs()
        .ok_or_else(|| ProveError::InvalidWitness("unassigned grade claim circuit".into()))?;

    prove_circuit(pk, circuit, public_inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{setup_credential_ownership, setup_grade_claim};
    use qualified_circuits::IncrementalMerkleTree;

    const SHAPE: CircuitShape = CircuitShape {
        test_height: 2,
        tree_depth: 4,
    };

    #[test]
    fn test_prove_ownership_public_inputs() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        let keys = setup_credential_ownership(&mut rng, &hasher, SHAPE).unwrap();

        let identity = Identity::new(Fr::from(1u64), Fr::from(2u64));
        let mut tree = IncrementalMerkleTree::for_group(hasher.clone(), 4, 5, 1).unwrap();
        tree.insert(identity.commitment(&hasher)).unwrap();

        let result = prove_ownership(
            &keys.proving_key,
            &hasher,
            SHAPE,
            identity,
            &MembershipWitness::Group(&tree),
            Fr::from(5u64),
            Fr::from(0u64),
        )
        .unwrap();

        assert_eq!(result.public_inputs.len(), 4);
        assert_eq!(result.public_inputs[0], tree.root());

        let bytes = result.serialize_proof().unwrap();
        assert_eq!(ProofWithInputs::deserialize_proof(&bytes).unwrap(), result.proof);
        assert_eq!(result.serialize_public_inputs().unwrap().len(), 4 * 32);
    }

    #[test]
    fn test_prove_ownership_non_member() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        let keys = setup_credential_ownership(&mut rng, &hasher, SHAPE).unwrap();
        let tree = IncrementalMerkleTree::for_group(hasher.clone(), 4, 5, 1).unwrap();

        let result = prove_ownership(
            &keys.proving_key,
            &hasher,
            SHAPE,
            Identity::new(Fr::from(1u64), Fr::from(2u64)),
            &MembershipWitness::Group(&tree),
            Fr::from(5u64),
            Fr::from(0u64),
        );
        assert!(matches!(result, Err(ProveError::InvalidWitness(_))));
    }

    #[test]
    fn test_grade_claim_below_threshold() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = PoseidonHasher::new();
        let keys = setup_grade_claim(&mut rng, &hasher, SHAPE).unwrap();
        let identity = Identity::new(Fr::from(1u64), Fr::from(2u64));
        let tree = IncrementalMerkleTree::for_group(hasher.clone(), 4, 5, 0).unwrap();

        let claim = GradeClaim {
            weighted_grade: 100,
            grade_threshold: 60,
            n_questions: 2,
            external_nullifier: Fr::from(5u64),
            signal_hash: Fr::from(0u64),
        };
        let result = prove_grade_claim(
            &keys.proving_key,
            &hasher,
            SHAPE,
            identity,
            &MembershipWitness::Group(&tree),
            claim,
        );
        assert!(matches!(result, Err(ProveError::InvalidWitness(_))));
    }

    #[test]
    fn test_grade_claim_rejects_out_of_range_claims() {
        let hasher = PoseidonHasher::new();
        let identity = Identity::new(Fr::from(1u64), Fr::from(2u64));
        let tree = IncrementalMerkleTree::for_group(hasher.clone(), 4, 5, 0).unwrap();
        let claim = GradeClaim {
            weighted_grade: u64::MAX,
            grade_threshold: 60,
            n_questions: 2,
            external_nullifier: Fr::from(5u64),
            signal_hash: Fr::from(0u64),
        };

        for claim in [
            GradeClaim { grade_threshold: 1 << 33, n_questions: 1 << 33, ..claim },
            GradeClaim { grade_threshold: 101, ..claim },
            GradeClaim { n_questions: 0, ..claim },
            GradeClaim { n_questions: 5, ..claim },
        ] {
            let result = grade_claim_circuit(
                &hasher,
                SHAPE,
                identity,
                &MembershipWitness::Group(&tree),
                claim,
            );
            assert!(matches!(result, Err(ProveError::InvalidWitness(_))));
        }
    }
}
