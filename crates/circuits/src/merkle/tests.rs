//! Integration tests for the merkle module.

use super::*;
use crate::poseidon::PoseidonHasher;
use ark_bn254::Fr;
use proptest::prelude::*;

fn filled_tree(depth: usize, count: u64) -> IncrementalMerkleTree {
    let mut tree = IncrementalMerkleTree::new(PoseidonHasher::new(), depth, Fr::from(0u64)).unwrap();
    for i in 0..count {
        tree.insert(Fr::from(1_000 + i)).unwrap();
    }
    tree
}

#[test]
fn test_full_workflow() {
    let hasher = PoseidonHasher::new();
    let tree = filled_tree(4, 7);

    for index in 0..tree.len() {
        let proof = tree.generate_proof(index).unwrap();
        assert_eq!(proof.root, tree.root());
        assert!(proof.verify(&hasher, 4).unwrap());
        assert!(tree.verify_proof(&proof).unwrap());
    }
}

#[test]
fn test_stale_proof_after_update() {
    let hasher = PoseidonHasher::new();
    let mut tree = filled_tree(4, 3);

    let stale = tree.generate_proof(1).unwrap();
    tree.update(1, Fr::from(77u64)).unwrap();

    assert!(!tree.verify_proof(&stale).unwrap());

    let fresh = tree.generate_proof(1).unwrap();
    assert_eq!(fresh.leaf, Fr::from(77u64));
    assert!(fresh.verify(&hasher, 4).unwrap());
    // siblings unchanged by updating the leaf itself
    assert_eq!(fresh.siblings, stale.siblings);
}

#[test]
fn test_fullness_boundary() {
    let mut tree = filled_tree(3, 8);
    assert_eq!(tree.len() as u64, tree.capacity());
    assert_eq!(tree.insert(Fr::from(1u64)), Err(MerkleError::TreeFull { capacity: 8 }));
}

#[test]
fn test_distinct_seeds_distinct_roots() {
    let hasher = PoseidonHasher::new();
    let a = IncrementalMerkleTree::for_group(hasher.clone(), 4, 1, 0).unwrap();
    let b = IncrementalMerkleTree::for_group(hasher.clone(), 4, 1, 1).unwrap();
    let c = IncrementalMerkleTree::for_group(hasher, 4, 2, 0).unwrap();

    assert_ne!(a.root(), b.root());
    assert_ne!(a.root(), c.root());
    assert_ne!(a.zero_leaf(), b.zero_leaf());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_every_leaf_proves(leaves in prop::collection::vec(any::<u64>(), 1..12)) {
        let hasher = PoseidonHasher::new();
        let mut tree = IncrementalMerkleTree::new(hasher.clone(), 4, Fr::from(5u64)).unwrap();
        for leaf in &leaves {
            tree.insert(Fr::from(*leaf)).unwrap();
        }

        for (index, leaf) in leaves.iter().enumerate() {
            let proof = tree.generate_proof(index).unwrap();
            prop_assert_eq!(proof.leaf, Fr::from(*leaf));
            prop_assert_eq!(proof.leaf_index(), index as u64);
            prop_assert!(proof.verify(&hasher, 4).unwrap());
        }

        let rebuilt = root_from_leaves(
            &hasher,
            &leaves.iter().map(|l| Fr::from(*l)).collect::<Vec<_>>(),
            4,
            tree.zero_leaf(),
        ).unwrap();
        prop_assert_eq!(rebuilt, tree.root());
    }

    #[test]
    fn prop_update_then_reprove(
        leaves in prop::collection::vec(any::<u64>(), 1..10),
        pick in any::<prop::sample::Index>(),
        replacement in any::<u64>(),
    ) {
        let hasher = PoseidonHasher::new();
        let mut tree = IncrementalMerkleTree::new(hasher.clone(), 4, Fr::from(0u64)).unwrap();
        for leaf in &leaves {
            tree.insert(Fr::from(*leaf)).unwrap();
        }

        let index = pick.index(leaves.len());
        tree.update(index, Fr::from(replacement)).unwrap();
        let proof = tree.generate_proof(index).unwrap();

        prop_assert_eq!(proof.leaf, Fr::from(replacement));
        prop_assert!(tree.verify_proof(&proof).unwrap());
    }
}
