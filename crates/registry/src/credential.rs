//! Credential entries and the identifiers that address them.

use std::fmt;

use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use qualified_circuits::{IncrementalMerkleTree, PoseidonHasher, TestParameters, MAX_GRADE};
use qualified_prover::RestrictionKind;

use crate::error::{RegistryError, RegistryResult};
use crate::ledger::{NullifierLedger, RootHistory};

pub type CredentialId = u64;

/// 20-byte account address of a credential admin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// The three groups of a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    Grade,
    Credentials,
    NoCredentials,
}

impl TreeKind {
    pub const ALL: [TreeKind; 3] = [TreeKind::Grade, TreeKind::Credentials, TreeKind::NoCredentials];

    /// Byte appended to the credential id when deriving the zero seed.
    pub fn tag(&self) -> u8 {
        match self {
            TreeKind::Grade => 0,
            TreeKind::Credentials => 1,
            TreeKind::NoCredentials => 2,
        }
    }

    fn index(&self) -> usize {
        self.tag() as usize
    }
}

/// A single group: one tree of one credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId {
    pub credential_id: CredentialId,
    pub kind: TreeKind,
}

impl GroupId {
    pub fn new(credential_id: CredentialId, kind: TreeKind) -> Self {
        Self {
            credential_id,
            kind,
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.credential_id, self.kind)
    }
}

/// What a user must already hold to attempt a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Restriction {
    None,
    /// Membership in the credentials group of `required_id`
    Credential { required_id: CredentialId },
    /// A grade of at least `threshold` on `required_id`
    Grade {
        required_id: CredentialId,
        threshold: u8,
    },
}

impl Restriction {
    /// Build a restriction from optional requirement fields.
    pub fn from_parts(
        required_id: Option<CredentialId>,
        threshold: Option<u8>,
    ) -> RegistryResult<Self> {
        match (required_id, threshold) {
            (None, None) => Ok(Restriction::None),
            (None, Some(_)) => Err(RegistryError::ThresholdWithoutRequirement),
            (Some(required_id), None) => Ok(Restriction::Credential { required_id }),
            (Some(required_id), Some(threshold)) => Ok(Restriction::Grade {
                required_id,
                threshold,
            }),
        }
    }

    pub fn kind(&self) -> RestrictionKind {
        match self {
            Restriction::None => RestrictionKind::None,
            Restriction::Credential { .. } => RestrictionKind::Credential,
            Restriction::Grade { .. } => RestrictionKind::Grade,
        }
    }

    pub fn required_id(&self) -> Option<CredentialId> {
        match self {
            Restriction::None => None,
            Restriction::Credential { required_id } | Restriction::Grade { required_id, .. } => {
                Some(*required_id)
            }
        }
    }

    /// Group of the required credential an auxiliary proof must target.
    pub fn required_group(&self) -> Option<GroupId> {
        match self {
            Restriction::None => None,
            Restriction::Credential { required_id } => {
                Some(GroupId::new(*required_id, TreeKind::Credentials))
            }
            Restriction::Grade { required_id, .. } => Some(GroupId::new(*required_id, TreeKind::Grade)),
        }
    }
}

/// Everything needed to create a credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialSpec {
    pub tree_depth: usize,
    /// Unix seconds after which attempts are rejected; 0 means no limit
    pub time_limit: u64,
    pub restriction: Restriction,
    pub test_parameters: TestParameters,
    pub uri: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Active,
    Invalidated,
}

/// Public metadata of a credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialData {
    pub id: CredentialId,
    pub admin: Address,
    pub tree_depth: usize,
    pub created_at: u64,
    pub time_limit: u64,
    pub state: CredentialState,
    pub restriction: Restriction,
    pub test_parameters: TestParameters,
    pub uri: String,
}

impl CredentialData {
    pub fn is_valid(&self) -> bool {
        self.state == CredentialState::Active
    }
}

/// Accumulated ratings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRating {
    pub sum: u64,
    pub count: u64,
}

impl CredentialRating {
    pub fn average(&self) -> Option<u64> {
        (self.count > 0).then(|| self.sum / self.count)
    }

    pub(crate) fn add(&mut self, rating: u8) {
        self.sum += rating as u64;
        self.count += 1;
    }
}

/// Registry-owned state of one credential.
pub(crate) struct Credential {
    pub data: CredentialData,
    pub open_answer_hashes: Option<Vec<Fr>>,
    pub rating: CredentialRating,
    pub nullifiers: NullifierLedger,
    trees: [IncrementalMerkleTree; 3],
    histories: [RootHistory; 3],
}

impl Credential {
    pub fn new(
        hasher: &PoseidonHasher,
        id: CredentialId,
        spec: CredentialSpec,
        admin: Address,
        now: u64,
    ) -> RegistryResult<Self> {
        let tree = |kind: TreeKind| {
            IncrementalMerkleTree::for_group(hasher.clone(), spec.tree_depth, id, kind.tag())
        };
        let trees = [
            tree(TreeKind::Grade)?,
            tree(TreeKind::Credentials)?,
            tree(TreeKind::NoCredentials)?,
        ];
        let histories = [
            RootHistory::new(trees[0].root(), now),
            RootHistory::new(trees[1].root(), now),
            RootHistory::new(trees[2].root(), now),
        ];

        Ok(Self {
            data: CredentialData {
                id,
                admin,
                tree_depth: spec.tree_depth,
                created_at: now,
                time_limit: spec.time_limit,
                state: CredentialState::Active,
                restriction: spec.restriction,
                test_parameters: spec.test_parameters,
                uri: spec.uri,
            },
            open_answer_hashes: None,
            rating: CredentialRating::default(),
            nullifiers: NullifierLedger::default(),
            trees,
            histories,
        })
    }

    pub fn group(&self, kind: TreeKind) -> GroupId {
        GroupId::new(self.data.id, kind)
    }

    pub fn tree(&self, kind: TreeKind) -> &IncrementalMerkleTree {
        &self.trees[kind.index()]
    }

    pub fn history(&self, kind: TreeKind) -> &RootHistory {
        &self.histories[kind.index()]
    }

    pub fn ensure_active(&self) -> RegistryResult<()> {
        match self.data.state {
            CredentialState::Active => Ok(()),
            CredentialState::Invalidated => Err(RegistryError::CredentialInvalidated(self.data.id)),
        }
    }

    /// Active and inside its time limit.
    pub fn ensure_open(&self, now: u64) -> RegistryResult<()> {
        self.ensure_active()?;
        if self.data.time_limit != 0 && now > self.data.time_limit {
            return Err(RegistryError::TimeLimitExceeded {
                credential_id: self.data.id,
                time_limit: self.data.time_limit,
            });
        }
        Ok(())
    }

    /// Root a group would have after appending `leaf`, with the leaf index.
    pub fn peek_insert(&self, kind: TreeKind, leaf: Fr) -> RegistryResult<(usize, Fr)> {
        self.tree(kind)
            .peek_insert(leaf)
            .map_err(|e| RegistryError::from_merkle(self.group(kind), e))
    }

    /// Append a leaf and record the resulting root.
    pub fn insert(&mut self, kind: TreeKind, leaf: Fr, now: u64) -> RegistryResult<usize> {
        let group = self.group(kind);
        let tree = &mut self.trees[kind.index()];
        let index = tree
            .insert(leaf)
            .map_err(|e| RegistryError::from_merkle(group, e))?;
        self.histories[kind.index()].record(tree.root(), now);
        Ok(index)
    }

    pub fn n_questions(&self) -> u64 {
        self.data.test_parameters.n_questions as u64
    }
}

/// Check a grade threshold is a grade.
pub(crate) fn validate_threshold(threshold: u8) -> RegistryResult<()> {
    if threshold > MAX_GRADE {
        return Err(RegistryError::InvalidGradeThreshold(threshold));
    }
    Ok(())
}
