//! Nullifier ledger and timestamped root history.

use std::collections::{HashMap, HashSet};

use ark_bn254::Fr;

/// Nullifier hashes consumed on one credential.
#[derive(Clone, Debug, Default)]
pub struct NullifierLedger {
    used: HashSet<Fr>,
}

impl NullifierLedger {
    pub fn contains(&self, nullifier_hash: &Fr) -> bool {
        self.used.contains(nullifier_hash)
    }

    /// Record a nullifier hash. Returns false if it was already consumed.
    pub fn consume(&mut self, nullifier_hash: Fr) -> bool {
        self.used.insert(nullifier_hash)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Outcome of checking a cited root against a group's history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootStatus {
    Current,
    /// Historical root still inside the validity window
    Valid { created_at: u64 },
    Expired { created_at: u64 },
    Unknown,
}

/// Every root a group has had, with the time it became current.
#[derive(Clone, Debug)]
pub struct RootHistory {
    current: Fr,
    created: HashMap<Fr, u64>,
}

impl RootHistory {
    pub fn new(root: Fr, now: u64) -> Self {
        let mut created = HashMap::new();
        created.insert(root, now);
        Self {
            current: root,
            created,
        }
    }

    pub fn current(&self) -> Fr {
        self.current
    }

    pub fn created_at(&self, root: &Fr) -> Option<u64> {
        self.created.get(root).copied()
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    pub fn record(&mut self, root: Fr, now: u64) {
        self.current = root;
        self.created.insert(root, now);
    }

    /// The current root never expires. A historical root expires once
    /// `now > created_at + validity_secs`.
    pub fn status(&self, root: &Fr, now: u64, validity_secs: u64) -> RootStatus {
        if *root == self.current {
            return RootStatus::Current;
        }
        match self.created.get(root) {
            None => RootStatus::Unknown,
            Some(&created_at) if now > created_at.saturating_add(validity_secs) => {
                RootStatus::Expired { created_at }
            }
            Some(&created_at) => RootStatus::Valid { created_at },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_nullifier_consumed_once() {
        let mut ledger = NullifierLedger::default();
        assert!(ledger.consume(Fr::from(9u64)));
        assert!(!ledger.consume(Fr::from(9u64)));
        assert!(ledger.contains(&Fr::from(9u64)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_root_expiry_boundary() {
        let mut history = RootHistory::new(Fr::from(1u64), 1_000);
        history.record(Fr::from(2u64), 1_500);
        let old = Fr::from(1u64);

        assert_eq!(history.status(&old, 1_000 + 900 - 1, 900), RootStatus::Valid { created_at: 1_000 });
        assert_eq!(history.status(&old, 1_000 + 900, 900), RootStatus::Valid { created_at: 1_000 });
        assert_eq!(history.status(&old, 1_000 + 900 + 1, 900), RootStatus::Expired { created_at: 1_000 });
        assert_eq!(history.status(&Fr::from(3u64), 1_000, 900), RootStatus::Unknown);
    }

    #[test]
    fn test_current_root_never_expires() {
        let history = RootHistory::new(Fr::from(1u64), 0);
        assert_eq!(history.status(&Fr::from(1u64), u64::MAX, 1), RootStatus::Current);
    }

    proptest! {
        #[test]
        fn prop_expiry_matches_window(created in 0u64..1_000_000, window in 0u64..100_000, elapsed in 0u64..200_000) {
            let mut history = RootHistory::new(Fr::from(1u64), created);
            history.record(Fr::from(2u64), created);

            let status = history.status(&Fr::from(1u64), created + elapsed, window);
            if elapsed > window {
                prop_assert_eq!(status, RootStatus::Expired { created_at: created });
            } else {
                prop_assert_eq!(status, RootStatus::Valid { created_at: created });
            }
        }
    }
}
