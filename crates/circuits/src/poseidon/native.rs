//! Native Poseidon hashing (outside circuits).

use std::fmt;
use std::sync::Arc;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;

use super::config::poseidon_config;

/// Hashing context shared by every component that needs Poseidon.
///
/// Construct one at startup and hand out clones; cloning only bumps the
/// reference count on the configuration.
#[derive(Clone)]
pub struct PoseidonHasher {
    config: Arc<PoseidonConfig<Fr>>,
}

impl PoseidonHasher {
    pub fn new() -> Self {
        Self {
            config: Arc::new(poseidon_config()),
        }
    }

    /// Shared configuration, as required by the R1CS gadgets.
    pub fn config(&self) -> Arc<PoseidonConfig<Fr>> {
        self.config.clone()
    }

    /// Hash any number of field elements.
    ///
    /// The input length is absorbed before the inputs, so hashes of
    /// different arities never collide through zero padding.
    pub fn hash(&self, inputs: &[Fr]) -> Fr {
        let mut sponge = PoseidonSponge::new(&self.config);
        sponge.absorb(&Fr::from(inputs.len() as u64));
        for input in inputs {
            sponge.absorb(input);
        }
        sponge.squeeze_field_elements(1)[0]
    }

    pub fn hash_one(&self, input: Fr) -> Fr {
        self.hash(&[input])
    }

    pub fn hash_two(&self, a: Fr, b: Fr) -> Fr {
        self.hash(&[a, b])
    }
}

impl Default for PoseidonHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoseidonHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoseidonHasher")
            .field("full_rounds", &self.config.full_rounds)
            .field("partial_rounds", &self.config.partial_rounds)
            .field("rate", &self.config.rate)
            .finish()
    }
}
