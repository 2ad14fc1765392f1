//! Credential registry for Block Qualified.
//!
//! Holds every credential's three groups (grades, holders, non-holders),
//! verifies graded attempts and claims through a `ProofOracle`, and tracks
//! consumed nullifiers and the age of every root.

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod ledger;
pub mod registry;


pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use credential::{
    Address, CredentialData, CredentialId, CredentialRating, CredentialSpec, CredentialState,
    GroupId, Restriction, TreeKind,
};
pub use error::{ErrorClass, RegistryError, RegistryResult};
pub use ledger::{NullifierLedger, RootHistory, RootStatus};
pub use registry::{AttemptOutcome, CredentialRegistry, GradeClaimProof, OwnershipClaim};
