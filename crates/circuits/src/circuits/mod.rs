//! R1CS circuits of the credential system.
//!
//! - `TestCircuit`: grading of an attempt and insertion of its commitments
//! - `GradeClaimCircuit`: a committed grade reaches a threshold
//! - `CredentialOwnershipCircuit`: membership in a credential group

mod grade_claim;
mod ownership;

pub use grade_claim::GradeClaimCircuit;
pub use ownership::CredentialOwnershipCircuit;
pub use test::{TestCircuit, TestInsertion};

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::grading::TEST_HEIGHT;
use crate::merkle::DEFAULT_DEPTH;

/// Sizes fixed at setup time. Keys generated for one shape only verify
/// proofs of that shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CircuitShape {
    /// Height of the answer trees
    pub test_height: usize,

    /// Depth of the credential group trees
    pub tree_depth: usize,
}

impl CircuitShape {
    pub fn new(test_height: usize, tree_depth: usize) -> Self {
        Self {
            test_height,
            tree_depth,
        }
    }

    /// Number of answer slots.
    pub fn width(&self) -> usize {
        1 << self.test_height
    }
}

impl Default for CircuitShape {
    fn default() -> Self {
        Self::new(TEST_HEIGHT, DEFAULT_DEPTH)
    }
}

/// Allocate `len` witnesses from an optional slice.
pub(crate) fn witness_vec(
    cs: ConstraintSystemRef<Fr>,
    values: Option<&[Fr]>,
    len: usize,
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    (0..len)
        .map(|i| {
            FpVar::new_witness(cs.clone(), || {
                values
                    .and_then(|v| v.get(i).copied())
                    .ok_or(SynthesisError::AssignmentMissing)
            })
        })
        .collect()
}
