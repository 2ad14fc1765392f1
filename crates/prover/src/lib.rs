//! Proof generation library for Block Qualified credentials.
//!
//! This crate provides utilities for:
//! - Trusted setup (generating proving and verifying keys per circuit shape)
//! - Proof generation for the test, grade claim and ownership circuits
//! - Local proof verification and the `ProofOracle` seam used by the registry
//! - Encoding and composing credential update payloads

pub mod compose;
pub mod oracle;
pub mod payload;
pub mod prove;
pub mod setup;
pub mod verify;

pub use compose::{compose_update, Attempt, RestrictionWitness};
pub use oracle::{CircuitId, CircuitWitness, Groth16Oracle, ProofOracle};
pub use payload::{
    AuxiliaryProof, CredentialUpdate, PayloadError, RestrictionKind, TestContext,
    TestProofPayload,
};
pub use prove::{
    prove_grade_claim, prove_ownership, prove_test, GradeClaim, ProofWithInputs, ProveError,
};
pub use setup::{setup_all_circuits, CircuitKeyPair, CircuitKeys, SetupError};
pub use verify::{verify_grade_claim, verify_ownership, verify_proof, verify_test, VerifyError};

use ark_bn254::Fr;

/// Common field type for all operations
pub type ConstraintF = Fr;
