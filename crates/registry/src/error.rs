//! Registry errors.

use ark_bn254::Fr;
use thiserror::Error;

use qualified_circuits::{GradingError, MerkleError, ParameterError};
use qualified_prover::{CircuitId, PayloadError, RestrictionKind, VerifyError};

use crate::credential::{Address, CredentialId, GroupId};

/// Broad category of a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input; nothing was attempted
    Validation,
    /// A proof did not verify
    Proof,
    /// The request conflicts with the registry state
    State,
    /// A tree has no room left
    Capacity,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("tree depth {depth} outside {min}..={max}")]
    InvalidTreeDepth { depth: usize, min: usize, max: usize },
    #[error("invalid test parameters: {0}")]
    InvalidParameters(#[from] ParameterError),
    #[error("time limit {time_limit} is not in the future (now {now})")]
    InvalidTimeLimit { time_limit: u64, now: u64 },
    #[error("credential {0} cannot require itself")]
    SelfRequirement(CredentialId),
    #[error("grade threshold given without a required credential")]
    ThresholdWithoutRequirement,
    #[error("grade threshold {0} exceeds 100")]
    InvalidGradeThreshold(u8),
    #[error("rating {0} exceeds 100")]
    InvalidRating(u8),
    #[error("expected {expected} answer hashes, got {got}")]
    AnswerCount { expected: usize, got: usize },
    #[error("answer hashes do not match the committed root")]
    AnswerKeyMismatch,
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error("credential expects a {expected:?} update, got {got:?}")]
    RestrictionMismatch {
        expected: RestrictionKind,
        got: RestrictionKind,
    },
    #[error("malformed payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("invalid {0} proof")]
    InvalidProof(CircuitId),
    #[error(transparent)]
    Verifier(#[from] VerifyError),

    #[error("credential {0} does not exist")]
    CredentialNotFound(CredentialId),
    #[error("required credential {0} does not exist")]
    RequiredCredentialNotFound(CredentialId),
    #[error("credential {0} already exists")]
    CredentialExists(CredentialId),
    #[error("{caller} is not the admin of credential {credential_id}")]
    NotAdmin {
        credential_id: CredentialId,
        caller: Address,
    },
    #[error("credential {0} is already invalidated")]
    AlreadyInvalidated(CredentialId),
    #[error("credential {0} is invalidated")]
    CredentialInvalidated(CredentialId),
    #[error("credential {credential_id} closed at {time_limit}")]
    TimeLimitExceeded {
        credential_id: CredentialId,
        time_limit: u64,
    },
    #[error("answers of credential {0} were already revealed")]
    AnswersAlreadyRevealed(CredentialId),
    #[error("nullifier hash {nullifier_hash} already used on credential {credential_id}")]
    NullifierReuse {
        credential_id: CredentialId,
        nullifier_hash: Fr,
    },
    #[error("root {root} of group {group} has expired")]
    ExpiredRoot { group: GroupId, root: Fr },
    #[error("root {root} is not a root of group {group}")]
    UnknownRoot { group: GroupId, root: Fr },
    #[error("claimed new root of group {group} does not match the tree")]
    RootMismatch { group: GroupId },
    #[error("leaf is not a member of group {group}")]
    LeafNotFound { group: GroupId },
    #[error("tree error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("group {group} is full: capacity {capacity}")]
    TreeFull { group: GroupId, capacity: u64 },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    pub fn class(&self) -> ErrorClass {
        use RegistryError::*;

        match self {
            Config(_)
            | InvalidTreeDepth { .. }
            | InvalidParameters(_)
            | InvalidTimeLimit { .. }
            | SelfRequirement(_)
            | ThresholdWithoutRequirement
            | InvalidGradeThreshold(_)
            | InvalidRating(_)
            | AnswerCount { .. }
            | AnswerKeyMismatch
            | Grading(_)
            | RestrictionMismatch { .. }
            | Payload(_)
            | Merkle(_) => ErrorClass::Validation,
            InvalidProof(_) | Verifier(_) => ErrorClass::Proof,
            CredentialNotFound(_)
            | RequiredCredentialNotFound(_)
            | CredentialExists(_)
            | NotAdmin { .. }
            | AlreadyInvalidated(_)
            | CredentialInvalidated(_)
            | TimeLimitExceeded { .. }
            | AnswersAlreadyRevealed(_)
            | NullifierReuse { .. }
            | ExpiredRoot { .. }
            | UnknownRoot { .. }
            | RootMismatch { .. }
            | LeafNotFound { .. } => ErrorClass::State,
            TreeFull { .. } => ErrorClass::Capacity,
        }
    }

    /// Attach the group to tree errors that concern it.
    pub(crate) fn from_merkle(group: GroupId, err: MerkleError) -> Self {
        match err {
            MerkleError::TreeFull { capacity } => RegistryError::TreeFull { group, capacity },
            MerkleError::LeafNotFound => RegistryError::LeafNotFound { group },
            other => RegistryError::Merkle(other),
        }
    }
}
