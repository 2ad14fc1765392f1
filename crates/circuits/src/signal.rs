//! Signal binding between a credential update and its auxiliary proof.
//!
//! An auxiliary proof (credential ownership or grade claim) carries a public
//! `signal_hash`. For updates it must equal
//!
//! signal_hash = Poseidon(
//!     identity_commitment,
//!     new_identity_tree_root,
//!     grade_commitment,
//!     new_grade_tree_root
//! )
//!
//! so the auxiliary proof cannot be replayed next to a different grading
//! outcome. The external nullifier scopes the auxiliary nullifier to the
//! credential being obtained.

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

use crate::field::keccak_to_field;
use crate::poseidon::PoseidonHasher;

/// Domain string mixed into rating nullifiers.
pub const RATING_DOMAIN: &[u8] = b"block-qualified/rating";

/// Outputs of a test proof that an auxiliary proof must commit to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateSignal {
    pub identity_commitment: Fr,
    pub new_identity_tree_root: Fr,
    pub grade_commitment: Fr,
    pub new_grade_tree_root: Fr,
}

impl UpdateSignal {
    /// Compute the signal hash from these outputs.
    pub fn compute_hash(&self, hasher: &PoseidonHasher) -> Fr {
        hasher.hash(&[
            self.identity_commitment,
            self.new_identity_tree_root,
            self.grade_commitment,
            self.new_grade_tree_root,
        ])
    }
}

/// External nullifier of the auxiliary proof for updates of `credential_id`.
pub fn update_external_nullifier(credential_id: u64) -> Fr {
    Fr::from(credential_id)
}

/// External nullifier for ratings of `credential_id`.
pub fn rating_external_nullifier(hasher: &PoseidonHasher, credential_id: u64) -> Fr {
    hasher.hash_two(Fr::from(credential_id), keccak_to_field(RATING_DOMAIN))
}

/// Signal of a rating: Poseidon(rating, keccak_to_field(comment)).
pub fn rating_signal_hash(hasher: &PoseidonHasher, rating: u8, comment: &str) -> Fr {
    hasher.hash_two(Fr::from(rating as u64), keccak_to_field(comment.as_bytes()))
}

/// Tie a public signal into the constraint system.
///
/// The signal takes no part in the statement; squaring it keeps the input
/// from being optimized out and makes a proof invalid for any other signal.
pub fn bind_signal_var(signal_hash: &FpVar<Fr>) -> Result<(), SynthesisError> {
    let square = signal_hash.square()?;
    square.enforce_equal(&(signal_hash * signal_hash))
}
