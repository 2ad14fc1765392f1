//! Credential state machine.
//!
//! Each credential sits behind its own mutex; a transition holds it for its
//! whole duration and performs every check before the first mutation, so a
//! failed call leaves the credential untouched. Auxiliary proofs cite a root
//! of a required credential, which is locked and released before the target
//! is locked. Requirements always point to older credentials, so locks are
//! never taken in a cycle.

use std::collections::HashMap;
use std::sync::Arc;

use ark_bn254::{Bn254, Fr};
use ark_groth16::Proof;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use qualified_circuits::{
    rating_external_nullifier, rating_signal_hash, update_external_nullifier, Grader,
    IncrementalMerkleTree, MerkleProof, PoseidonHasher, TestInsertion, MAX_GRADE,
};
use qualified_prover::{
    AuxiliaryProof, CircuitId, CredentialUpdate, ProofOracle, TestContext,
};

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::credential::{
    validate_threshold, Address, Credential, CredentialData, CredentialId, CredentialRating,
    CredentialSpec, CredentialState, GroupId, Restriction, TreeKind,
};
use crate::error::{RegistryError, RegistryResult};
use crate::ledger::RootStatus;

/// Where an accepted attempt landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub grade_commitment_index: usize,
    pub identity_commitment_index: usize,
    /// Credentials group on a pass, no-credentials group otherwise
    pub identity_group: GroupId,
    pub test_passed: bool,
}

/// Proof of membership in the credentials group of a credential.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnershipClaim {
    pub proof: AuxiliaryProof,
    pub signal_hash: Fr,
    pub external_nullifier: Fr,
}

/// Proof of a committed grade of at least `grade_threshold`.
#[derive(Clone, Debug, PartialEq)]
pub struct GradeClaimProof {
    pub proof: AuxiliaryProof,
    pub signal_hash: Fr,
    pub external_nullifier: Fr,
    pub grade_threshold: u8,
}

type Entry = Arc<Mutex<Credential>>;

pub struct CredentialRegistry<O, C = SystemClock> {
    config: RegistryConfig,
    hasher: PoseidonHasher,
    grader: Grader,
    oracle: O,
    clock: C,
    credentials: RwLock<HashMap<CredentialId, Entry>>,
}

impl<O: ProofOracle> CredentialRegistry<O, SystemClock> {
    pub fn new(config: RegistryConfig, hasher: PoseidonHasher, oracle: O) -> RegistryResult<Self> {
        Self::with_clock(config, hasher, oracle, SystemClock)
    }
}

impl<O: ProofOracle, C: Clock> CredentialRegistry<O, C> {
    pub fn with_clock(
        config: RegistryConfig,
        hasher: PoseidonHasher,
        oracle: O,
        clock: C,
    ) -> RegistryResult<Self> {
        config.validate()?;

        Ok(Self {
            grader: Grader::new(hasher.clone(), config.test_height),
            config,
            hasher,
            oracle,
            clock,
            credentials: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn hasher(&self) -> &PoseidonHasher {
        &self.hasher
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    fn entry(&self, id: CredentialId) -> RegistryResult<Entry> {
        self.credentials
            .read()
            .get(&id)
            .cloned()
            .ok_or(RegistryError::CredentialNotFound(id))
    }

    fn with_credential<T>(
        &self,
        id: CredentialId,
        f: impl FnOnce(&Credential) -> RegistryResult<T>,
    ) -> RegistryResult<T> {
        let entry = self.entry(id)?;
        let credential = entry.lock();
        f(&credential)
    }

    // --- Transitions ---

    pub fn create_credential(
        &self,
        id: CredentialId,
        spec: CredentialSpec,
        admin: Address,
    ) -> RegistryResult<()> {
        let (min, max) = (self.config.min_tree_depth, self.config.max_tree_depth);
        if spec.tree_depth < min || spec.tree_depth > max {
            return Err(RegistryError::InvalidTreeDepth {
                depth: spec.tree_depth,
                min,
                max,
            });
        }

        spec.test_parameters.validate(self.config.test_height)?;

        let now = self.clock.now();
        if spec.time_limit != 0 && spec.time_limit <= now {
            return Err(RegistryError::InvalidTimeLimit {
                time_limit: spec.time_limit,
                now,
            });
        }

        if let Restriction::Grade { threshold, .. } = spec.restriction {
            validate_threshold(threshold)?;
        }
        if spec.restriction.required_id() == Some(id) {
            return Err(RegistryError::SelfRequirement(id));
        }

        let mut credentials = self.credentials.write();
        if credentials.contains_key(&id) {
            return Err(RegistryError::CredentialExists(id));
        }
        if let Some(required) = spec.restriction.required_id() {
            if !credentials.contains_key(&required) {
                return Err(RegistryError::RequiredCredentialNotFound(required));
            }
        }

        let depth = spec.tree_depth;
        let restriction = spec.restriction;
        let credential = Credential::new(&self.hasher, id, spec, admin, now)?;
        credentials.insert(id, Arc::new(Mutex::new(credential)));

        info!(credential_id = id, depth, ?restriction, %admin, "Credential created");
        Ok(())
    }

    /// Decode a payload for the credential's restriction and submit it.
    pub fn update_credential(&self, id: CredentialId, payload: &[u8]) -> RegistryResult<AttemptOutcome> {
        let kind = self.with_credential(id, |c| Ok(c.data.restriction.kind()))?;
        let update = CredentialUpdate::decode(payload, kind)?;
        self.submit_graded_attempt(id, &update)
    }

    /// Verify a graded attempt and append its commitments.
    pub fn submit_graded_attempt(
        &self,
        id: CredentialId,
        update: &CredentialUpdate,
    ) -> RegistryResult<AttemptOutcome> {
        let entry = self.entry(id)?;
        let restriction = entry.lock().data.restriction;
        if update.kind() != restriction.kind() {
            return Err(RegistryError::RestrictionMismatch {
                expected: restriction.kind(),
                got: update.kind(),
            });
        }

        let now = self.clock.now();
        let auxiliary = match update.auxiliary() {
            Some(proof) => Some((proof, self.check_required(&restriction, &proof.root, now)?)),
            None => None,
        };

        let mut credential = entry.lock();
        credential.ensure_open(now)?;
        if let Some((proof, _)) = auxiliary {
            check_nullifier(&credential, &proof.nullifier_hash)?;
        }

        let test = update.test();
        let identity_kind = if test.test_passed {
            TreeKind::Credentials
        } else {
            TreeKind::NoCredentials
        };

        let (grade_index, grade_root) = credential.peek_insert(TreeKind::Grade, test.grade_commitment)?;
        if grade_root != test.new_grade_tree_root {
            return Err(RegistryError::RootMismatch {
                group: credential.group(TreeKind::Grade),
            });
        }
        let (identity_index, identity_root) =
            credential.peek_insert(identity_kind, test.identity_commitment)?;
        if identity_root != test.new_identity_tree_root {
            return Err(RegistryError::RootMismatch {
                group: credential.group(identity_kind),
            });
        }

        let params = credential.data.test_parameters;
        let context = TestContext {
            identity_commitment_index: identity_index as u64,
            old_identity_tree_root: credential.tree(identity_kind).root(),
            grade_commitment_index: grade_index as u64,
            old_grade_tree_root: credential.tree(TreeKind::Grade).root(),
            test_root: params.test_root(&self.hasher),
            parameters_hash: params.parameters_hash(&self.hasher),
        };
        self.verify(CircuitId::Test, &test.proof, &test.public_inputs(&context))?;

        if let Some((proof, required_questions)) = auxiliary {
            let signal_hash = update.signal_hash(&self.hasher);
            let external_nullifier = update_external_nullifier(id);
            match restriction {
                Restriction::Credential { .. } => self.verify(
                    CircuitId::CredentialOwnership,
                    &proof.proof,
                    &proof.ownership_inputs(signal_hash, external_nullifier),
                )?,
                Restriction::Grade { threshold, .. } => self.verify(
                    CircuitId::GradeClaim,
                    &proof.proof,
                    &proof.grade_claim_inputs(
                        signal_hash,
                        external_nullifier,
                        threshold as u64,
                        required_questions,
                    ),
                )?,
                Restriction::None => {
                    return Err(RegistryError::RestrictionMismatch {
                        expected: restriction.kind(),
                        got: update.kind(),
                    })
                }
            }
        }

        let grade_commitment_index = credential.insert(TreeKind::Grade, test.grade_commitment, now)?;
        let identity_commitment_index =
            credential.insert(identity_kind, test.identity_commitment, now)?;
        if let Some((proof, _)) = auxiliary {
            credential.nullifiers.consume(proof.nullifier_hash);
        }

        debug!(
            credential_id = id,
            grade_root = %credential.tree(TreeKind::Grade).root(),
            identity_root = %credential.tree(identity_kind).root(),
            "Roots recorded"
        );
        info!(
            credential_id = id,
            passed = test.test_passed,
            grade_commitment_index,
            identity_commitment_index,
            "Graded attempt accepted"
        );

        Ok(AttemptOutcome {
            grade_commitment_index,
            identity_commitment_index,
            identity_group: credential.group(identity_kind),
            test_passed: test.test_passed,
        })
    }

    /// Terminal: an invalidated credential accepts no further attempts.
    pub fn invalidate_credential(&self, id: CredentialId, caller: Address) -> RegistryResult<()> {
        let entry = self.entry(id)?;
        let mut credential = entry.lock();
        check_admin(&credential, caller)?;
        if credential.data.state == CredentialState::Invalidated {
            return Err(RegistryError::AlreadyInvalidated(id));
        }

        credential.data.state = CredentialState::Invalidated;
        info!(credential_id = id, "Credential invalidated");
        Ok(())
    }

    /// One-time reveal of the open answer hashes.
    pub fn verify_answers(
        &self,
        id: CredentialId,
        answer_hashes: &[Fr],
        caller: Address,
    ) -> RegistryResult<()> {
        let entry = self.entry(id)?;
        let mut credential = entry.lock();
        check_admin(&credential, caller)?;
        if credential.open_answer_hashes.is_some() {
            return Err(RegistryError::AnswersAlreadyRevealed(id));
        }

        let expected = credential.n_questions() as usize;
        if answer_hashes.len() != expected {
            return Err(RegistryError::AnswerCount {
                expected,
                got: answer_hashes.len(),
            });
        }
        if self.grader.open_answers_hashes_root(answer_hashes)?
            != credential.data.test_parameters.open_answers_hashes_root
        {
            return Err(RegistryError::AnswerKeyMismatch);
        }

        credential.open_answer_hashes = Some(answer_hashes.to_vec());
        info!(credential_id = id, "Open answers revealed");
        Ok(())
    }

    /// Rate a credential as one of its holders.
    ///
    /// Holders may still rate an invalidated credential.
    pub fn rate_credential(
        &self,
        id: CredentialId,
        rating: u8,
        comment: &str,
        proof: &AuxiliaryProof,
    ) -> RegistryResult<()> {
        if rating > MAX_GRADE {
            return Err(RegistryError::InvalidRating(rating));
        }

        let now = self.clock.now();
        let entry = self.entry(id)?;
        let mut credential = entry.lock();
        self.check_root(&credential, TreeKind::Credentials, &proof.root, now)?;
        check_nullifier(&credential, &proof.nullifier_hash)?;

        let signal_hash = rating_signal_hash(&self.hasher, rating, comment);
        let external_nullifier = rating_external_nullifier(&self.hasher, id);
        self.verify(
            CircuitId::CredentialOwnership,
            &proof.proof,
            &proof.ownership_inputs(signal_hash, external_nullifier),
        )?;

        credential.nullifiers.consume(proof.nullifier_hash);
        credential.rating.add(rating);
        info!(credential_id = id, rating, comment, "Credential rated");
        Ok(())
    }

    /// Check and consume a proof of holding credential `id`.
    pub fn verify_credential_ownership_proof(
        &self,
        id: CredentialId,
        claim: &OwnershipClaim,
    ) -> RegistryResult<()> {
        let now = self.clock.now();
        let entry = self.entry(id)?;
        let mut credential = entry.lock();
        credential.ensure_active()?;
        self.check_root(&credential, TreeKind::Credentials, &claim.proof.root, now)?;
        check_nullifier(&credential, &claim.proof.nullifier_hash)?;

        self.verify(
            CircuitId::CredentialOwnership,
            &claim.proof.proof,
            &claim
                .proof
                .ownership_inputs(claim.signal_hash, claim.external_nullifier),
        )?;

        credential.nullifiers.consume(claim.proof.nullifier_hash);
        info!(credential_id = id, "Credential ownership proof accepted");
        Ok(())
    }

    /// Check and consume a proof of a grade on credential `id`.
    pub fn verify_grade_claim_proof(
        &self,
        id: CredentialId,
        claim: &GradeClaimProof,
    ) -> RegistryResult<()> {
        validate_threshold(claim.grade_threshold)?;

        let now = self.clock.now();
        let entry = self.entry(id)?;
        let mut credential = entry.lock();
        credential.ensure_active()?;
        self.check_root(&credential, TreeKind::Grade, &claim.proof.root, now)?;
        check_nullifier(&credential, &claim.proof.nullifier_hash)?;

        self.verify(
            CircuitId::GradeClaim,
            &claim.proof.proof,
            &claim.proof.grade_claim_inputs(
                claim.signal_hash,
                claim.external_nullifier,
                claim.grade_threshold as u64,
                credential.n_questions(),
            ),
        )?;

        credential.nullifiers.consume(claim.proof.nullifier_hash);
        info!(
            credential_id = id,
            threshold = claim.grade_threshold,
            "Grade claim proof accepted"
        );
        Ok(())
    }

    // --- Checks ---

    /// Check a root cited by an auxiliary proof; returns the required
    /// credential's question count.
    fn check_required(&self, restriction: &Restriction, root: &Fr, now: u64) -> RegistryResult<u64> {
        let group = restriction
            .required_group()
            .ok_or(RegistryError::RestrictionMismatch {
                expected: restriction.kind(),
                got: restriction.kind(),
            })?;
        let entry = self
            .entry(group.credential_id)
            .map_err(|_| RegistryError::RequiredCredentialNotFound(group.credential_id))?;
        let required = entry.lock();
        required.ensure_active()?;
        self.check_root(&required, group.kind, root, now)?;
        Ok(required.n_questions())
    }

    fn check_root(
        &self,
        credential: &Credential,
        kind: TreeKind,
        root: &Fr,
        now: u64,
    ) -> RegistryResult<()> {
        let group = credential.group(kind);
        match credential
            .history(kind)
            .status(root, now, self.config.root_validity_secs)
        {
            RootStatus::Current | RootStatus::Valid { .. } => Ok(()),
            RootStatus::Expired { created_at } => {
                debug!(%group, created_at, now, "Expired root cited");
                Err(RegistryError::ExpiredRoot { group, root: *root })
            }
            RootStatus::Unknown => Err(RegistryError::UnknownRoot { group, root: *root }),
        }
    }

    fn verify(&self, circuit: CircuitId, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> RegistryResult<()> {
        match self.oracle.verify(circuit, proof, public_inputs) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(%circuit, "Proof rejected");
                Err(RegistryError::InvalidProof(circuit))
            }
            Err(e) => {
                warn!(%circuit, error = %e, "Proof verification failed");
                Err(e.into())
            }
        }
    }

    // --- Read accessors ---

    pub fn credential_ids(&self) -> Vec<CredentialId> {
        let mut ids: Vec<CredentialId> = self.credentials.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn credential_data(&self, id: CredentialId) -> RegistryResult<CredentialData> {
        self.with_credential(id, |c| Ok(c.data.clone()))
    }

    pub fn merkle_tree_root(&self, group: GroupId) -> RegistryResult<Fr> {
        self.with_credential(group.credential_id, |c| Ok(c.tree(group.kind).root()))
    }

    pub fn number_of_merkle_tree_leaves(&self, group: GroupId) -> RegistryResult<usize> {
        self.with_credential(group.credential_id, |c| Ok(c.tree(group.kind).len()))
    }

    pub fn merkle_tree_depth(&self, group: GroupId) -> RegistryResult<usize> {
        self.with_credential(group.credential_id, |c| Ok(c.tree(group.kind).depth()))
    }

    /// When `root` became current in `group`, if it ever did.
    pub fn root_created_at(&self, group: GroupId, root: &Fr) -> RegistryResult<Option<u64>> {
        self.with_credential(group.credential_id, |c| Ok(c.history(group.kind).created_at(root)))
    }

    pub fn was_nullifier_hash_used(&self, id: CredentialId, nullifier_hash: &Fr) -> RegistryResult<bool> {
        self.with_credential(id, |c| Ok(c.nullifiers.contains(nullifier_hash)))
    }

    pub fn credential_rating(&self, id: CredentialId) -> RegistryResult<CredentialRating> {
        self.with_credential(id, |c| Ok(c.rating))
    }

    pub fn open_answer_hashes(&self, id: CredentialId) -> RegistryResult<Option<Vec<Fr>>> {
        self.with_credential(id, |c| Ok(c.open_answer_hashes.clone()))
    }

    /// Snapshot of a group's tree.
    pub fn group_tree(&self, group: GroupId) -> RegistryResult<IncrementalMerkleTree> {
        self.with_credential(group.credential_id, |c| Ok(c.tree(group.kind).clone()))
    }

    /// Membership path of `leaf` against the current root of `group`.
    pub fn membership_proof(&self, group: GroupId, leaf: Fr) -> RegistryResult<MerkleProof> {
        self.with_credential(group.credential_id, |c| {
            let tree = c.tree(group.kind);
            let index = tree
                .index_of(&leaf)
                .ok_or(RegistryError::LeafNotFound { group })?;
            tree.generate_proof(index)
                .map_err(|e| RegistryError::from_merkle(group, e))
        })
    }

    /// Path of the next free slot of `group`.
    pub fn insertion_proof(&self, group: GroupId) -> RegistryResult<MerkleProof> {
        self.with_credential(group.credential_id, |c| {
            c.tree(group.kind)
                .insertion_proof()
                .map_err(|e| RegistryError::from_merkle(group, e))
        })
    }

    /// Insertion paths of all three groups, as a test proof needs them.
    pub fn test_insertion(&self, id: CredentialId) -> RegistryResult<TestInsertion> {
        self.with_credential(id, |c| {
            let path = |kind: TreeKind| {
                c.tree(kind)
                    .insertion_proof()
                    .map_err(|e| RegistryError::from_merkle(c.group(kind), e))
            };
            Ok(TestInsertion {
                grade: path(TreeKind::Grade)?,
                credentials: path(TreeKind::Credentials)?,
                no_credentials: path(TreeKind::NoCredentials)?,
            })
        })
    }
}

fn check_admin(credential: &Credential, caller: Address) -> RegistryResult<()> {
    if credential.data.admin != caller {
        return Err(RegistryError::NotAdmin {
            credential_id: credential.data.id,
            caller,
        });
    }
    Ok(())
}

fn check_nullifier(credential: &Credential, nullifier_hash: &Fr) -> RegistryResult<()> {
    if credential.nullifiers.contains(nullifier_hash) {
        return Err(RegistryError::NullifierReuse {
            credential_id: credential.data.id,
            nullifier_hash: *nullifier_hash,
        });
    }
    Ok(())
}
