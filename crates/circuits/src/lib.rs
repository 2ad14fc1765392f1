//! ZK circuits and native primitives for graded credentials.
//!
//! This crate provides:
//! - `PoseidonHasher`: the hash oracle, natively and in-circuit
//! - `IncrementalMerkleTree`: append-only credential groups
//! - `Grader`: grading of attempts and grade commitments
//! - `TestCircuit`: prove an attempt was graded and inserted correctly
//! - `GradeClaimCircuit`: prove a committed grade reaches a threshold
//! - `CredentialOwnershipCircuit`: prove membership in a credential group

pub mod circuits;
pub mod field;
pub mod grading;
pub mod identity;
pub mod merkle;
pub mod poseidon;
pub mod range_check;
pub mod signal;

#[cfg(test)]
mod tests;

pub use circuits::{
    CircuitShape, CredentialOwnershipCircuit, GradeClaimCircuit, TestCircuit, TestInsertion,
};
pub use field::{
    fr_from_be_bytes, fr_from_canonical_bytes, fr_to_be_bytes, fr_to_decimal, fr_to_hex,
    fr_to_u64, keccak_to_field, parse_fr, FieldError, FIELD_BYTES,
};
pub use grading::{
    multiple_choice_field, open_answer_field, AnswerWitness, GradeResult, Grader, GradingError,
    ParameterError, TestParameters, MAX_GRADE, TEST_HEIGHT,
};
pub use identity::{grade_commitment, Identity};
pub use merkle::{
    group_seed, root_from_leaves, IncrementalMerkleTree, MembershipWitness, MerkleError,
    MerkleProof, DEFAULT_DEPTH, MAX_DEPTH,
};
pub use poseidon::PoseidonHasher;
pub use signal::{
    rating_external_nullifier, rating_signal_hash, update_external_nullifier, UpdateSignal,
    RATING_DOMAIN,
};

use ark_bn254::Fr;

/// Common type aliases
pub type ConstraintF = Fr;
