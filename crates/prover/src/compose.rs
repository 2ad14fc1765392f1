//! Assemble credential update payloads from an attempt.
//!
//! The test proof comes first; its outputs form the update signal that any
//! auxiliary proof is bound to, with the credential id as external
//! nullifier. A proof for one attempt therefore cannot be replayed against
//! a different attempt or credential.

use qualified_circuits::{
    update_external_nullifier, AnswerWitness, CircuitShape, GradeResult, Identity,
    MembershipWitness, PoseidonHasher, TestInsertion, TestParameters,
};
use tracing::debug;

use crate::oracle::{CircuitWitness, ProofOracle};
use crate::payload::{AuxiliaryProof, CredentialUpdate, TestProofPayload};
use crate::prove::{grade_claim_circuit, ownership_circuit, test_circuit, GradeClaim, ProveError};

/// Extra proof required by a restricted credential.
pub enum RestrictionWitness<'a> {
    None,
    /// Prove membership of `group`, the required credential's group.
    Credential { group: MembershipWitness<'a> },
    /// Prove a grade of at least `grade_threshold` in `grade_group`.
    Grade {
        grade_group: MembershipWitness<'a>,
        weighted_grade: u64,
        grade_threshold: u64,
        n_questions: u64,
    },
}

/// One graded attempt at a credential test.
pub struct Attempt<'a> {
    pub credential_id: u64,
    pub identity: Identity,
    pub parameters: TestParameters,
    pub answers: AnswerWitness,
    pub insertion: &'a TestInsertion,
}

/// Prove an attempt and any restriction proof, returning the payload to submit.
pub fn compose_update<O: ProofOracle + ?Sized>(
    oracle: &O,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
    attempt: Attempt<'_>,
    restriction: RestrictionWitness<'_>,
) -> Result<(CredentialUpdate, GradeResult), ProveError> {
    let (circuit, result) = test_circuit(
        hasher,
        shape,
        attempt.identity,
        attempt.parameters,
        attempt.answers,
        attempt.insertion,
    )?;
    let test_proof = oracle.prove(CircuitWitness::Test(circuit))?;
    let test = TestProofPayload::from_proof(&test_proof)?;

    let signal_hash = test.signal().compute_hash(hasher);
    let external_nullifier = update_external_nullifier(attempt.credential_id);

    let update = match restriction {
        RestrictionWitness::None => CredentialUpdate::Base(test),
        RestrictionWitness::Credential { group } => {
            let circuit = ownership_circuit(
                hasher,
                shape,
                attempt.identity,
                &group,
                external_nullifier,
                signal_hash,
            )?;
            let proof = oracle.prove(CircuitWitness::CredentialOwnership(circuit))?;
            CredentialUpdate::CredentialRestricted {
                ownership: AuxiliaryProof::from_proof(&proof)?,
                test,
            }
        }
        RestrictionWitness::Grade {
            grade_group,
            weighted_grade,
            grade_threshold,
            n_questions,
        } => {
            let claim = GradeClaim {
                weighted_grade,
                grade_threshold,
                n_questions,
                external_nullifier,
                signal_hash,
            };
            let circuit = grade_claim_circuit(hasher, shape, attempt.identity, &grade_group, claim)?;
            let proof = oracle.prove(CircuitWitness::GradeClaim(circuit))?;
            CredentialUpdate::GradeRestricted {
                grade_claim: AuxiliaryProof::from_proof(&proof)?,
                test,
            }
        }
    };

    debug!(
        credential_id = attempt.credential_id,
        kind = ?update.kind(),
        grade = result.grade,
        passed = result.passed,
        "Composed credential update"
    );

    Ok((update, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CircuitId;
    use crate::payload::RestrictionKind;
    use crate::prove::ProofWithInputs;
    use crate::verify::VerifyError;
    use ark_bn254::{Bn254, Fr};
    use ark_groth16::Proof;
    use qualified_circuits::{grade_commitment, Grader, IncrementalMerkleTree};

    const SHAPE: CircuitShape = CircuitShape {
        test_height: 2,
        tree_depth: 4,
    };

    /// Returns the default proof, keeping the public inputs.
    struct EchoOracle;

    impl ProofOracle for EchoOracle {
        fn prove(&self, witness: CircuitWitness) -> Result<ProofWithInputs, ProveError> {
            Ok(ProofWithInputs {
                proof: Proof::default(),
                public_inputs: witness.public_inputs().unwrap(),
            })
        }

        fn verify(&self, _: CircuitId, _: &Proof<Bn254>, _: &[Fr]) -> Result<bool, VerifyError> {
            Ok(true)
        }
    }

    struct Fixture {
        hasher: PoseidonHasher,
        identity: Identity,
        params: TestParameters,
        answers: AnswerWitness,
        trees: [IncrementalMerkleTree; 3],
    }

    fn fixture() -> Fixture {
        let hasher = PoseidonHasher::new();
        let grader = Grader::new(hasher.clone(), SHAPE.test_height);
        let open: Vec<String> = vec!["a".into(), "b".into()];
        let (params, answer_hashes) = grader
            .build_parameters(50, 50, 2, &[vec![1], vec![2]], &open)
            .unwrap();
        let answers = grader
            .answer_witness(&[vec![1], vec![2]], &open, &params, &answer_hashes)
            .unwrap();
        let trees = [0u8, 1, 2]
            .map(|tag| IncrementalMerkleTree::for_group(hasher.clone(), SHAPE.tree_depth, 3, tag).unwrap());

        Fixture {
            identity: Identity::new(Fr::from(11u64), Fr::from(12u64)),
            hasher,
            params,
            answers,
            trees,
        }
    }

    fn insertion(f: &Fixture) -> TestInsertion {
        TestInsertion {
            grade: f.trees[0].insertion_proof().unwrap(),
            credentials: f.trees[1].insertion_proof().unwrap(),
            no_credentials: f.trees[2].insertion_proof().unwrap(),
        }
    }

    fn attempt<'a>(f: &Fixture, insertion: &'a TestInsertion) -> Attempt<'a> {
        Attempt {
            credential_id: 3,
            identity: f.identity,
            parameters: f.params,
            answers: f.answers.clone(),
            insertion,
        }
    }

    #[test]
    fn test_base_update() {
        let f = fixture();
        let insertion = insertion(&f);
        let (update, result) =
            compose_update(&EchoOracle, &f.hasher, SHAPE, attempt(&f, &insertion), RestrictionWitness::None)
                .unwrap();

        assert_eq!(update.kind(), RestrictionKind::None);
        assert!(result.passed);
        assert_eq!(result.grade, 100);
        assert_eq!(update.test().identity_commitment, f.identity.commitment(&f.hasher));
        assert!(update.test().test_passed);

        let mut credentials = f.trees[1].clone();
        credentials.insert(result.identity_commitment).unwrap();
        assert_eq!(update.test().new_identity_tree_root, credentials.root());
    }

    #[test]
    fn test_credential_restricted_update_is_bound() {
        let f = fixture();
        let insertion = insertion(&f);

        let mut required = IncrementalMerkleTree::for_group(f.hasher.clone(), SHAPE.tree_depth, 1, 1).unwrap();
        required.insert(f.identity.commitment(&f.hasher)).unwrap();

        let restriction = RestrictionWitness::Credential {
            group: MembershipWitness::Group(&required),
        };
        let (update, _) =
            compose_update(&EchoOracle, &f.hasher, SHAPE, attempt(&f, &insertion), restriction).unwrap();

        let ownership = update.auxiliary().unwrap();
        assert_eq!(update.kind(), RestrictionKind::Credential);
        assert_eq!(ownership.root, required.root());
        assert_eq!(
            ownership.nullifier_hash,
            f.identity.nullifier_hash(&f.hasher, update_external_nullifier(3))
        );
    }

    #[test]
    fn test_grade_restriction_below_threshold_fails() {
        let f = fixture();
        let insertion = insertion(&f);

        let mut grades = IncrementalMerkleTree::for_group(f.hasher.clone(), SHAPE.tree_depth, 1, 0).unwrap();
        let commitment = grade_commitment(&f.hasher, f.identity.commitment(&f.hasher), 120);
        grades.insert(commitment).unwrap();

        let restriction = |threshold| RestrictionWitness::Grade {
            grade_group: MembershipWitness::Group(&grades),
            weighted_grade: 120,
            grade_threshold: threshold,
            n_questions: 2,
        };

        let (update, _) =
            compose_update(&EchoOracle, &f.hasher, SHAPE, attempt(&f, &insertion), restriction(60)).unwrap();
        assert_eq!(update.kind(), RestrictionKind::Grade);
        assert_eq!(update.auxiliary().unwrap().root, grades.root());

        let err = compose_update(&EchoOracle, &f.hasher, SHAPE, attempt(&f, &insertion), restriction(61));
        assert!(matches!(err, Err(ProveError::InvalidWitness(_))));
    }
}
