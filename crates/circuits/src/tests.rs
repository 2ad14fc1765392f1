//! Groth16 end-to-end tests for the credential circuits.

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};

use crate::circuits::{
    CircuitShape, CredentialOwnershipCircuit, GradeClaimCircuit, TestCircuit, TestInsertion,
};
use crate::grading::Grader;
use crate::identity::Identity;
use crate::merkle::IncrementalMerkleTree;
use crate::poseidon::PoseidonHasher;
use crate::signal::{update_external_nullifier, UpdateSignal};

const SHAPE: CircuitShape = CircuitShape {
    test_height: 2,
    tree_depth: 4,
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Full Groth16 round for the test circuit, then a grade claim on the result.
#[test]
fn test_attempt_then_grade_claim_full_proof() {
    let mut rng = StdRng::seed_from_u64(42);
    let hasher = PoseidonHasher::new();
    let grader = Grader::new(hasher.clone(), SHAPE.test_height);

    // Setup
    let (test_pk, test_vk) = Groth16::<Bn254>::circuit_specific_setup(
        TestCircuit::empty(hasher.clone(), SHAPE),
        &mut rng,
    )
    .unwrap();
    let (claim_pk, claim_vk) = Groth16::<Bn254>::circuit_specific_setup(
        GradeClaimCircuit::empty(hasher.clone(), SHAPE),
        &mut rng,
    )
    .unwrap();

    // Test with 3 questions, 50% multiple choice
    let (params, answer_hashes) = grader
        .build_parameters(
            50,
            50,
            3,
            &[vec![0], vec![1], vec![2, 3]],
            &strings(&["one", "two", "three"]),
        )
        .unwrap();

    let credential_id = 1u64;
    let mut grade_tree = IncrementalMerkleTree::for_group(hasher.clone(), 4, credential_id, 0).unwrap();
    let mut credentials = IncrementalMerkleTree::for_group(hasher.clone(), 4, credential_id, 1).unwrap();
    let no_credentials = IncrementalMerkleTree::for_group(hasher.clone(), 4, credential_id, 2).unwrap();

    let identity = Identity::random(&mut rng);
    let answers = grader
        .answer_witness(
            &[vec![0], vec![1], vec![3, 2]],
            &strings(&["one", "two", "four"]),
            &params,
            &answer_hashes,
        )
        .unwrap();
    let insertion = TestInsertion {
        grade: grade_tree.insertion_proof().unwrap(),
        credentials: credentials.insertion_proof().unwrap(),
        no_credentials: no_credentials.insertion_proof().unwrap(),
    };
    let (circuit, result) =
        TestCircuit::new(hasher.clone(), SHAPE, identity, params, answers, &insertion).unwrap();

    // 3 * 50 + 50 * 2 = 250
    assert_eq!(result.weighted_grade, 250);
    assert!(result.passed);

    let public_inputs = circuit.public_inputs().unwrap();
    let proof = Groth16::<Bn254>::prove(&test_pk, circuit, &mut rng).unwrap();
    assert!(Groth16::<Bn254>::verify(&test_vk, &public_inputs, &proof).unwrap());

    // A flipped pass flag must not verify
    let mut tampered = public_inputs.clone();
    tampered[10] = Fr::from(0u64);
    assert!(!Groth16::<Bn254>::verify(&test_vk, &tampered, &proof).unwrap());

    grade_tree.insert(result.grade_commitment).unwrap();
    credentials.insert(result.identity_commitment).unwrap();
    assert_eq!(public_inputs[7], grade_tree.root());
    assert_eq!(public_inputs[3], credentials.root());

    // Claim a grade of at least 80 (250 >= 80 * 3)
    let claim = GradeClaimCircuit::new(
        hasher.clone(),
        SHAPE,
        identity,
        result.weighted_grade,
        grade_tree.generate_proof(0).unwrap(),
        80,
        3,
        Fr::from(7u64),
        Fr::from(1234u64),
    )
    .unwrap();
    let claim_inputs = claim.public_inputs().unwrap();
    let claim_proof = Groth16::<Bn254>::prove(&claim_pk, claim, &mut rng).unwrap();
    assert!(Groth16::<Bn254>::verify(&claim_vk, &claim_inputs, &claim_proof).unwrap());

    // Same proof cannot be reused for another signal
    let mut other_signal = claim_inputs.clone();
    other_signal[2] = Fr::from(4321u64);
    assert!(!Groth16::<Bn254>::verify(&claim_vk, &other_signal, &claim_proof).unwrap());
}

/// Ownership proof bound to an update signal.
#[test]
fn test_ownership_full_proof() {
    let mut rng = StdRng::seed_from_u64(7);
    let hasher = PoseidonHasher::new();

    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(
        CredentialOwnershipCircuit::empty(hasher.clone(), SHAPE),
        &mut rng,
    )
    .unwrap();

    let identity = Identity::random(&mut rng);
    let mut group = IncrementalMerkleTree::for_group(hasher.clone(), 4, 3, 1).unwrap();
    group.insert(Fr::from(5u64)).unwrap();
    group.insert(identity.commitment(&hasher)).unwrap();

    let signal = UpdateSignal {
        identity_commitment: Fr::from(1u64),
        new_identity_tree_root: Fr::from(2u64),
        grade_commitment: Fr::from(3u64),
        new_grade_tree_root: Fr::from(4u64),
    }
    .compute_hash(&hasher);

    let circuit = CredentialOwnershipCircuit::new(
        hasher.clone(),
        SHAPE,
        identity,
        group.generate_proof(1).unwrap(),
        update_external_nullifier(9),
        signal,
    )
    .unwrap();
    let inputs = circuit.public_inputs().unwrap();
    let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).unwrap();

    assert!(Groth16::<Bn254>::verify(&vk, &inputs, &proof).unwrap());
    assert_eq!(inputs[1], identity.nullifier_hash(&hasher, Fr::from(9u64)));

    let mut other_scope = inputs.clone();
    other_scope[3] = update_external_nullifier(10);
    assert!(!Groth16::<Bn254>::verify(&vk, &other_scope, &proof).unwrap());
}
