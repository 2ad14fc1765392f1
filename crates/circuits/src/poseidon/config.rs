//! Poseidon configuration for BN254.
//!
//! Width 3 (rate 2, capacity 1), 8 full rounds, 57 partial rounds, x^5 S-box.
//! Round constants are expanded from keccak256 of a fixed domain string so
//! every party derives the same table without shipping it.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_ff::MontFp;

use crate::field::fr_from_be_bytes;

/// Number of full rounds (beginning + end)
pub const FULL_ROUNDS: usize = 8;

/// Number of partial rounds
pub const PARTIAL_ROUNDS: usize = 57;

/// S-box exponent
pub const ALPHA: u64 = 5;

/// Absorption rate
pub const RATE: usize = 2;

/// Sponge capacity
pub const CAPACITY: usize = 1;

const ROUND_CONSTANT_DOMAIN: &[u8] = b"block-qualified/poseidon/bn254/t3";

/// Build the Poseidon configuration used by the native hasher and the gadgets.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    let mds = vec![
        vec![
            MontFp!("7511745149465107256748700652201246547602992235352608707588321460060273774987"),
            MontFp!("10370080108974718697676803824769673834027675643658433702224577712625900127200"),
            MontFp!("19705173408229649878903981084052839426532978878058043055305024233888854471533"),
        ],
        vec![
            MontFp!("18732019378264290557468133440468564866454307626475683536618613112504878618481"),
            MontFp!("20870176810702568768751421378473869562658540583882454726129544628203806653987"),
            MontFp!("7266061498423634438932006217945904744987532209093972706694887950396501989428"),
        ],
        vec![
            MontFp!("9131299761947733513298312097611845208338517739621853568979632113419485819303"),
            MontFp!("10595341252162738537912664445405114076324478519622938027420701542910180337937"),
            MontFp!("11597556804922396090267472882856054602429588299176362916247939723151043581408"),
        ],
    ];

    PoseidonConfig::new(
        FULL_ROUNDS,
        PARTIAL_ROUNDS,
        ALPHA,
        mds,
        round_constants(),
        RATE,
        CAPACITY,
    )
}

/// ark[r][i] = keccak256(domain || r || i) reduced into the field.
fn round_constants() -> Vec<Vec<Fr>> {
    use sha3::{Digest, Keccak256};

    let width = RATE + CAPACITY;
    (0..FULL_ROUNDS + PARTIAL_ROUNDS)
        .map(|round| {
            (0..width)
                .map(|position| {
                    let mut hasher = Keccak256::new();
                    hasher.update(ROUND_CONSTANT_DOMAIN);
                    hasher.update((round as u32).to_be_bytes());
                    hasher.update((position as u32).to_be_bytes());
                    fr_from_be_bytes(&hasher.finalize())
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_shape() {
        let config = poseidon_config();
        assert_eq!(config.full_rounds, FULL_ROUNDS);
        assert_eq!(config.partial_rounds, PARTIAL_ROUNDS);
        assert_eq!(config.rate, RATE);
        assert_eq!(config.capacity, CAPACITY);
        assert_eq!(config.mds.len(), RATE + CAPACITY);
        assert_eq!(config.ark.len(), FULL_ROUNDS + PARTIAL_ROUNDS);
        assert!(config.ark.iter().all(|row| row.len() == RATE + CAPACITY));
    }

    #[test]
    fn test_round_constants_deterministic_and_distinct() {
        let a = round_constants();
        let b = round_constants();
        assert_eq!(a, b);
        assert_ne!(a[0][0], a[0][1]);
        assert_ne!(a[0][0], a[1][0]);
    }
}
