//! User identities and the values derived from them.

use std::fmt;

use ark_bn254::Fr;
use ark_std::rand::Rng;
use ark_std::UniformRand;

use crate::poseidon::PoseidonHasher;

/// Secret identity of a user: `(nullifier, trapdoor)`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    nullifier: Fr,
    trapdoor: Fr,
}

impl Identity {
    pub fn new(nullifier: Fr, trapdoor: Fr) -> Self {
        Self {
            nullifier,
            trapdoor,
        }
    }

    /// Sample a fresh identity.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::new(Fr::rand(rng), Fr::rand(rng))
    }

    pub fn nullifier(&self) -> Fr {
        self.nullifier
    }

    pub fn trapdoor(&self) -> Fr {
        self.trapdoor
    }

    /// H(nullifier, trapdoor)
    pub fn commitment(&self, hasher: &PoseidonHasher) -> Fr {
        hasher.hash_two(self.nullifier, self.trapdoor)
    }

    /// H(external_nullifier, nullifier)
    pub fn nullifier_hash(&self, hasher: &PoseidonHasher, external_nullifier: Fr) -> Fr {
        hasher.hash_two(external_nullifier, self.nullifier)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("nullifier", &"<redacted>")
            .field("trapdoor", &"<redacted>")
            .finish()
    }
}

/// H(identity_commitment, weighted_grade)
pub fn grade_commitment(hasher: &PoseidonHasher, identity_commitment: Fr, weighted_grade: u64) -> Fr {
    hasher.hash_two(identity_commitment, Fr::from(weighted_grade))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_commitment_deterministic() {
        let hasher = PoseidonHasher::new();
        let identity = Identity::new(Fr::from(1u64), Fr::from(2u64));

        assert_eq!(identity.commitment(&hasher), identity.commitment(&hasher));
        assert_eq!(identity.commitment(&hasher), hasher.hash_two(Fr::from(1u64), Fr::from(2u64)));
    }

    #[test]
    fn test_nullifier_hash_scoped() {
        let hasher = PoseidonHasher::new();
        let identity = Identity::new(Fr::from(1u64), Fr::from(2u64));

        assert_ne!(
            identity.nullifier_hash(&hasher, Fr::from(1u64)),
            identity.nullifier_hash(&hasher, Fr::from(2u64))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let identity = Identity::new(Fr::from(123456u64), Fr::from(654321u64));
        let printed = format!("{:?}", identity);

        assert!(printed.contains("redacted"));
        assert!(!printed.contains("123456"));
    }

    #[test]
    fn test_random_identities_differ() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = Identity::random(&mut rng);
        let b = Identity::random(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_grade_commitment_binds_grade() {
        let hasher = PoseidonHasher::new();
        let idc = Identity::new(Fr::from(1u64), Fr::from(2u64)).commitment(&hasher);

        assert_ne!(
            grade_commitment(&hasher, idc, 100),
            grade_commitment(&hasher, idc, 101)
        );
    }

    #[test]
    fn test_grade_commitments_distinct_per_identity() {
        let hasher = PoseidonHasher::new();
        let idc = Identity::new(Fr::from(1u64), Fr::from(2u64)).commitment(&hasher);
        let n_questions = 3u64;

        let commitments: HashSet<Fr> = (0..=100 * n_questions)
            .map(|weighted_grade| grade_commitment(&hasher, idc, weighted_grade))
            .collect();
        assert_eq!(commitments.len() as u64, 100 * n_questions + 1);
    }
}
