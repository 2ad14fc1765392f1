//! Byte layout of credential update payloads.
//!
//! Every value is a 32-byte big-endian word. A Groth16 proof takes 8 words:
//!
//! ```text
//! a.x, a.y, b.x.c1, b.x.c0, b.y.c1, b.y.c0, c.x, c.y
//! ```
//!
//! (`G2` coordinates put the imaginary part first; the point at infinity is
//! encoded as all-zero coordinates.) Booleans are the words 0 and 1.
//!
//! - base update: `identity_commitment, new_identity_tree_root,
//!   grade_commitment, new_grade_tree_root, proof, test_passed` (13 words)
//! - restricted update: `root, nullifier_hash, proof` of the auxiliary proof
//!   followed by the base update (23 words)
//!
//! Decoding is strict: exact length, canonical field words, booleans in
//! {0, 1}, and points on the curve and in the prime-order subgroup.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField, Zero};
use ark_groth16::Proof;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use qualified_circuits::{PoseidonHasher, UpdateSignal};

use crate::prove::{ProofWithInputs, ProveError};

/// Size of one encoded word.
pub const WORD_BYTES: usize = 32;

/// Words of an encoded proof.
pub const PROOF_WORDS: usize = 8;

/// Words of a base update.
pub const BASE_WORDS: usize = 4 + PROOF_WORDS + 1;

/// Words of a credential- or grade-restricted update.
pub const RESTRICTED_WORDS: usize = 2 + PROOF_WORDS + BASE_WORDS;

/// Errors while decoding a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload has {got} bytes, expected {expected}")]
    Length { expected: usize, got: usize },
    #[error("word {index} is not a canonical field element")]
    NonCanonicalWord { index: usize },
    #[error("word {index} is not a boolean")]
    InvalidBool { index: usize },
    #[error("point starting at word {index} is not a valid curve point")]
    InvalidPoint { index: usize },
    #[error("expected {expected} public inputs, got {got}")]
    PublicInputCount { expected: usize, got: usize },
}

impl From<PayloadError> for ProveError {
    fn from(err: PayloadError) -> Self {
        ProveError::InvalidWitness(err.to_string())
    }
}

/// Which auxiliary proof a credential's updates carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    None,
    Credential,
    Grade,
}

impl RestrictionKind {
    /// Encoded size of an update for this restriction.
    pub fn payload_len(&self) -> usize {
        match self {
            RestrictionKind::None => BASE_WORDS * WORD_BYTES,
            RestrictionKind::Credential | RestrictionKind::Grade => RESTRICTED_WORDS * WORD_BYTES,
        }
    }
}

/// Outputs of a test proof, as submitted by the user.
#[derive(Clone, Debug, PartialEq)]
pub struct TestProofPayload {
    pub identity_commitment: Fr,
    pub new_identity_tree_root: Fr,
    pub grade_commitment: Fr,
    pub new_grade_tree_root: Fr,
    pub proof: Proof<Bn254>,
    pub test_passed: bool,
}

/// Public inputs of a test proof that the verifier takes from its own state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestContext {
    pub identity_commitment_index: u64,
    pub old_identity_tree_root: Fr,
    pub grade_commitment_index: u64,
    pub old_grade_tree_root: Fr,
    pub test_root: Fr,
    pub parameters_hash: Fr,
}

impl TestProofPayload {
    /// Extract the submitted outputs from a freshly generated test proof.
    pub fn from_proof(proof: &ProofWithInputs) -> Result<Self, PayloadError> {
        let inputs = &proof.public_inputs;
        if inputs.len() != 11 {
            return Err(PayloadError::PublicInputCount {
                expected: 11,
                got: inputs.len(),
            });
        }

        Ok(Self {
            identity_commitment: inputs[1],
            new_identity_tree_root: inputs[3],
            grade_commitment: inputs[5],
            new_grade_tree_root: inputs[7],
            proof: proof.proof.clone(),
            test_passed: !inputs[10].is_zero(),
        })
    }

    /// Full public input vector in test circuit order.
    pub fn public_inputs(&self, context: &TestContext) -> Vec<Fr> {
        vec![
            Fr::from(context.identity_commitment_index),
            self.identity_commitment,
            context.old_identity_tree_root,
            self.new_identity_tree_root,
            Fr::from(context.grade_commitment_index),
            self.grade_commitment,
            context.old_grade_tree_root,
            self.new_grade_tree_root,
            context.test_root,
            context.parameters_hash,
            Fr::from(self.test_passed as u64),
        ]
    }

    /// Outputs an auxiliary proof must be bound to.
    pub fn signal(&self) -> UpdateSignal {
        UpdateSignal {
            identity_commitment: self.identity_commitment,
            new_identity_tree_root: self.new_identity_tree_root,
            grade_commitment: self.grade_commitment,
            new_grade_tree_root: self.new_grade_tree_root,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        push_field(out, &self.identity_commitment);
        push_field(out, &self.new_identity_tree_root);
        push_field(out, &self.grade_commitment);
        push_field(out, &self.new_grade_tree_root);
        push_proof(out, &self.proof);
        push_field(out, &Fr::from(self.test_passed as u64));
    }

    fn decode_from(reader: &mut WordReader<'_>) -> Result<Self, PayloadError> {
        Ok(Self {
            identity_commitment: reader.field()?,
            new_identity_tree_root: reader.field()?,
            grade_commitment: reader.field()?,
            new_grade_tree_root: reader.field()?,
            proof: reader.proof()?,
            test_passed: reader.boolean()?,
        })
    }
}

/// Ownership or grade claim proof prepended to a restricted update.
#[derive(Clone, Debug, PartialEq)]
pub struct AuxiliaryProof {
    /// Root of the required credential's group the proof was made against
    pub root: Fr,
    pub nullifier_hash: Fr,
    pub proof: Proof<Bn254>,
}

impl AuxiliaryProof {
    /// Extract root and nullifier hash from a generated auxiliary proof.
    pub fn from_proof(proof: &ProofWithInputs) -> Result<Self, PayloadError> {
        let inputs = &proof.public_inputs;
        if inputs.len() < 4 {
            return Err(PayloadError::PublicInputCount {
                expected: 4,
                got: inputs.len(),
            });
        }

        Ok(Self {
            root: inputs[0],
            nullifier_hash: inputs[1],
            proof: proof.proof.clone(),
        })
    }

    /// Public inputs of an ownership proof.
    pub fn ownership_inputs(&self, signal_hash: Fr, external_nullifier: Fr) -> Vec<Fr> {
        vec![self.root, self.nullifier_hash, signal_hash, external_nullifier]
    }

    /// Public inputs of a grade claim proof.
    pub fn grade_claim_inputs(
        &self,
        signal_hash: Fr,
        external_nullifier: Fr,
        grade_threshold: u64,
        n_questions: u64,
    ) -> Vec<Fr> {
        vec![
            self.root,
            self.nullifier_hash,
            signal_hash,
            external_nullifier,
            Fr::from(grade_threshold),
            Fr::from(n_questions),
        ]
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        push_field(out, &self.root);
        push_field(out, &self.nullifier_hash);
        push_proof(out, &self.proof);
    }

    fn decode_from(reader: &mut WordReader<'_>) -> Result<Self, PayloadError> {
        Ok(Self {
            root: reader.field()?,
            nullifier_hash: reader.field()?,
            proof: reader.proof()?,
        })
    }
}

/// A graded attempt as submitted for a credential.
#[derive(Clone, Debug, PartialEq)]
pub enum CredentialUpdate {
    Base(TestProofPayload),
    CredentialRestricted {
        ownership: AuxiliaryProof,
        test: TestProofPayload,
    },
    GradeRestricted {
        grade_claim: AuxiliaryProof,
        test: TestProofPayload,
    },
}

impl CredentialUpdate {
    pub fn kind(&self) -> RestrictionKind {
        match self {
            CredentialUpdate::Base(_) => RestrictionKind::None,
            CredentialUpdate::CredentialRestricted { .. } => RestrictionKind::Credential,
            CredentialUpdate::GradeRestricted { .. } => RestrictionKind::Grade,
        }
    }

    pub fn test(&self) -> &TestProofPayload {
        match self {
            CredentialUpdate::Base(test)
            | CredentialUpdate::CredentialRestricted { test, .. }
            | CredentialUpdate::GradeRestricted { test, .. } => test,
        }
    }

    pub fn auxiliary(&self) -> Option<&AuxiliaryProof> {
        match self {
            CredentialUpdate::Base(_) => None,
            CredentialUpdate::CredentialRestricted { ownership, .. } => Some(ownership),
            CredentialUpdate::GradeRestricted { grade_claim, .. } => Some(grade_claim),
        }
    }

    /// Signal hash the auxiliary proof must carry.
    pub fn signal_hash(&self, hasher: &PoseidonHasher) -> Fr {
        self.test().signal().compute_hash(hasher)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.kind().payload_len());
        if let Some(auxiliary) = self.auxiliary() {
            auxiliary.encode_into(&mut out);
        }
        self.test().encode_into(&mut out);
        out
    }

    /// Decode a payload for a credential with the given restriction.
    pub fn decode(bytes: &[u8], kind: RestrictionKind) -> Result<Self, PayloadError> {
        let expected = kind.payload_len();
        if bytes.len() != expected {
            return Err(PayloadError::Length {
                expected,
                got: bytes.len(),
            });
        }

        let mut reader = WordReader::new(bytes);
        let update = match kind {
            RestrictionKind::None => CredentialUpdate::Base(TestProofPayload::decode_from(&mut reader)?),
            RestrictionKind::Credential => {
                let ownership = AuxiliaryProof::decode_from(&mut reader)?;
                CredentialUpdate::CredentialRestricted {
                    ownership,
                    test: TestProofPayload::decode_from(&mut reader)?,
                }
            }
            RestrictionKind::Grade => {
                let grade_claim = AuxiliaryProof::decode_from(&mut reader)?;
                CredentialUpdate::GradeRestricted {
                    grade_claim,
                    test: TestProofPayload::decode_from(&mut reader)?,
                }
            }
        };

        Ok(update)
    }
}

fn field_to_word<F: PrimeField>(value: &F) -> [u8; WORD_BYTES] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut word = [0u8; WORD_BYTES];
    word[WORD_BYTES - bytes.len()..].copy_from_slice(&bytes);
    word
}

fn word_to_field<F: PrimeField>(word: &[u8]) -> Option<F> {
    let value = F::from_be_bytes_mod_order(word);
    (field_to_word(&value).as_slice() == word).then_some(value)
}

fn push_field<F: PrimeField>(out: &mut Vec<u8>, value: &F) {
    out.extend_from_slice(&field_to_word(value));
}

fn push_g1(out: &mut Vec<u8>, point: &G1Affine) {
    if point.infinity {
        push_field(out, &Fq::zero());
        push_field(out, &Fq::zero());
    } else {
        push_field(out, &point.x);
        push_field(out, &point.y);
    }
}

fn push_g2(out: &mut Vec<u8>, point: &G2Affine) {
    let (x, y) = if point.infinity {
        (Fq2::zero(), Fq2::zero())
    } else {
        (point.x, point.y)
    };
    push_field(out, &x.c1);
    push_field(out, &x.c0);
    push_field(out, &y.c1);
    push_field(out, &y.c0);
}

fn push_proof(out: &mut Vec<u8>, proof: &Proof<Bn254>) {
    push_g1(out, &proof.a);
    push_g2(out, &proof.b);
    push_g1(out, &proof.c);
}

/// Sequential reader over 32-byte words.
struct WordReader<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl<'a> WordReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, index: 0 }
    }

    fn next_word<F: PrimeField>(&mut self) -> Result<F, PayloadError> {
        let index = self.index;
        let start = index * WORD_BYTES;
        let word = self
            .bytes
            .get(start..start + WORD_BYTES)
            .ok_or(PayloadError::Length {
                expected: start + WORD_BYTES,
                got: self.bytes.len(),
            })?;
        self.index += 1;
        word_to_field(word).ok_or(PayloadError::NonCanonicalWord { index })
    }

    fn field(&mut self) -> Result<Fr, PayloadError> {
        self.next_word::<Fr>()
    }

    fn boolean(&mut self) -> Result<bool, PayloadError> {
        let index = self.index;
        let value = self.field()?;
        if value == Fr::from(0u64) {
            Ok(false)
        } else if value == Fr::from(1u64) {
            Ok(true)
        } else {
            Err(PayloadError::InvalidBool { index })
        }
    }

    fn g1(&mut self) -> Result<G1Affine, PayloadError> {
        let index = self.index;
        let x: Fq = self.next_word()?;
        let y: Fq = self.next_word()?;
        if x.is_zero() && y.is_zero() {
            return Ok(G1Affine::zero());
        }

        let point = G1Affine::new_unchecked(x, y);
        if point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve() {
            Ok(point)
        } else {
            Err(PayloadError::InvalidPoint { index })
        }
    }

    fn g2(&mut self) -> Result<G2Affine, PayloadError> {
        let index = self.index;
        let x_c1: Fq = self.next_word()?;
        let x_c0: Fq = self.next_word()?;
        let y_c1: Fq = self.next_word()?;
        let y_c0: Fq = self.next_word()?;
        let x = Fq2::new(x_c0, x_c1);
        let y = Fq2::new(y_c0, y_c1);
        if x.is_zero() && y.is_zero() {
            return Ok(G2Affine::zero());
        }

        let point = G2Affine::new_unchecked(x, y);
        if point.is_on_curve() && point.is_in_correct_subgroup_assuming_on_curve() {
            Ok(point)
        } else {
            Err(PayloadError::InvalidPoint { index })
        }
    }

    fn proof(&mut self) -> Result<Proof<Bn254>, PayloadError> {
        Ok(Proof {
            a: self.g1()?,
            b: self.g2()?,
            c: self.g1()?,
        })
    }
}
