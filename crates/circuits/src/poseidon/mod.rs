//! Poseidon hash oracle for BN254.
//!
//! The native `PoseidonHasher` and the R1CS gadgets share one configuration,
//! so values computed off-circuit match the constraints exactly.

mod config;
mod gadgets;
mod native;

#[cfg(test)]
mod tests;

pub use config::{poseidon_config, ALPHA, CAPACITY, FULL_ROUNDS, PARTIAL_ROUNDS, RATE};
pub use gadgets::{poseidon_hash_two_var, poseidon_hash_var};
pub use native::PoseidonHasher;
