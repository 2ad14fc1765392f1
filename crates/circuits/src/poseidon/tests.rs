//! Property tests for the hash oracle.

use super::*;
use ark_bn254::Fr;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_hash_is_pure(a in any::<u64>(), b in any::<u64>()) {
        let hasher = PoseidonHasher::new();
        let inputs = [Fr::from(a), Fr::from(b)];
        prop_assert_eq!(hasher.hash(&inputs), hasher.hash(&inputs));
    }

    #[test]
    fn prop_order_matters(a in any::<u64>(), b in any::<u64>()) {
        prop_assume!(a != b);
        let hasher = PoseidonHasher::new();
        prop_assert_ne!(
            hasher.hash_two(Fr::from(a), Fr::from(b)),
            hasher.hash_two(Fr::from(b), Fr::from(a))
        );
    }
}

#[test]
fn test_no_collisions_over_sample() {
    let hasher = PoseidonHasher::new();
    let seed = hasher.hash_one(Fr::from(99u64));

    let outputs: HashSet<Fr> = (0..500u64)
        .map(|i| hasher.hash_two(seed, Fr::from(i)))
        .collect();

    assert_eq!(outputs.len(), 500);
}

#[test]
fn test_shared_context_matches_fresh_context() {
    let shared = PoseidonHasher::new();
    let cloned = shared.clone();
    let fresh = PoseidonHasher::new();

    let x = Fr::from(5u64);
    assert_eq!(cloned.hash_one(x), fresh.hash_one(x));
    assert_eq!(shared.config().ark, fresh.config().ark);
}
