//! HTTP request handlers for grading and proof generation.

use std::sync::Arc;

use ark_bn254::Fr;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use qualified_circuits::{
    fr_to_hex, parse_fr, FieldError, GradeResult, GradingError, Identity, MembershipWitness,
    MerkleProof, TestInsertion, TestParameters,
};
use qualified_prover::{
    compose_update,
    prove::{grade_claim_circuit, ownership_circuit},
    Attempt, CircuitWitness, GradeClaim, ProofOracle, ProofWithInputs, ProveError,
    RestrictionKind, RestrictionWitness,
};

use crate::AppState;

const CODE_INVALID_FIELD: &str = "invalid_field";
const CODE_INVALID_PROOF_PATH: &str = "invalid_merkle_proof";
const CODE_GRADING: &str = "grading_error";
const CODE_INVALID_WITNESS: &str = "invalid_witness";
const CODE_INTERNAL: &str = "internal_error";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    fn field(name: &str, err: FieldError) -> Self {
        Self::bad_request(CODE_INVALID_FIELD, format!("{}: {}", name, err))
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        Self::bad_request(CODE_GRADING, err.to_string())
    }
}

impl From<ProveError> for ApiError {
    fn from(err: ProveError) -> Self {
        match err {
            ProveError::InvalidWitness(message) => {
                Self::bad_request(CODE_INVALID_WITNESS, message)
            }
            other => {
                warn!(error = %other, "proof generation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, other.to_string())
            }
        }
    }
}

/// Error response
#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            error_code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn field(name: &str, value: &str) -> Result<Fr, ApiError> {
    parse_fr(value).map_err(|err| ApiError::field(name, err))
}

fn fields(name: &str, values: &[String]) -> Result<Vec<Fr>, ApiError> {
    values.iter().map(|value| field(name, value)).collect()
}

// ============ Shared JSON types ============

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityJson {
    pub nullifier: String,
    pub trapdoor: String,
}

impl IdentityJson {
    fn parse(&self) -> Result<Identity, ApiError> {
        Ok(Identity::new(
            field("identity.nullifier", &self.nullifier)?,
            field("identity.trapdoor", &self.trapdoor)?,
        ))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParametersJson {
    pub minimum_grade: u8,
    pub multiple_choice_weight: u8,
    pub n_questions: u32,
    pub multiple_choice_root: String,
    pub open_answers_hashes_root: String,
}

impl ParametersJson {
    fn parse(&self) -> Result<TestParameters, ApiError> {
        Ok(TestParameters {
            minimum_grade: self.minimum_grade,
            multiple_choice_weight: self.multiple_choice_weight,
            n_questions: self.n_questions,
            multiple_choice_root: field("multiple_choice_root", &self.multiple_choice_root)?,
            open_answers_hashes_root: field(
                "open_answers_hashes_root",
                &self.open_answers_hashes_root,
            )?,
        })
    }
}

impl From<&TestParameters> for ParametersJson {
    fn from(params: &TestParameters) -> Self {
        Self {
            minimum_grade: params.minimum_grade,
            multiple_choice_weight: params.multiple_choice_weight,
            n_questions: params.n_questions,
            multiple_choice_root: fr_to_hex(&params.multiple_choice_root),
            open_answers_hashes_root: fr_to_hex(&params.open_answers_hashes_root),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerkleProofJson {
    pub root: String,
    pub leaf: String,
    pub siblings: Vec<String>,
    pub path_indices: Vec<bool>,
}

impl MerkleProofJson {
    fn parse(&self, depth: usize) -> Result<MerkleProof, ApiError> {
        if self.siblings.len() != depth || self.path_indices.len() != depth {
            return Err(ApiError::bad_request(
                CODE_INVALID_PROOF_PATH,
                format!(
                    "expected {} siblings and path indices, got {} and {}",
                    depth,
                    self.siblings.len(),
                    self.path_indices.len()
                ),
            ));
        }

        Ok(MerkleProof::new(
            field("root", &self.root)?,
            field("leaf", &self.leaf)?,
            fields("siblings", &self.siblings)?,
            self.path_indices.clone(),
        ))
    }
}

impl From<&MerkleProof> for MerkleProofJson {
    fn from(proof: &MerkleProof) -> Self {
        Self {
            root: fr_to_hex(&proof.root),
            leaf: fr_to_hex(&proof.leaf),
            siblings: proof.siblings.iter().map(fr_to_hex).collect(),
            path_indices: proof.path_indices.clone(),
        }
    }
}

/// A graded attempt: the answers and the test they answer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttemptJson {
    pub identity: IdentityJson,
    pub parameters: ParametersJson,
    /// Revealed open answer hashes, one per question
    pub answer_hashes: Vec<String>,
    pub multiple_choice_answers: Vec<Vec<u32>>,
    pub open_answers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GradeResponse {
    pub grade: u64,
    pub weighted_grade: u64,
    pub multiple_choice_grade: u64,
    pub open_answers_grade: u64,
    pub n_correct: u64,
    pub passed: bool,
    pub identity_commitment: String,
    pub grade_commitment: String,
}

impl From<&GradeResult> for GradeResponse {
    fn from(result: &GradeResult) -> Self {
        Self {
            grade: result.grade,
            weighted_grade: result.weighted_grade,
            multiple_choice_grade: result.multiple_choice_grade,
            open_answers_grade: result.open_answers_grade,
            n_correct: result.n_correct,
            passed: result.passed,
            identity_commitment: fr_to_hex(&result.identity_commitment),
            grade_commitment: fr_to_hex(&result.grade_commitment),
        }
    }
}

/// Common proof response
#[derive(Debug, Serialize, Deserialize)]
pub struct ProofResponse {
    pub proof: String,
    pub public_inputs: Vec<String>,
}

impl TryFrom<&ProofWithInputs> for ProofResponse {
    type Error = ApiError;

    fn try_from(proof: &ProofWithInputs) -> Result<Self, ApiError> {
        Ok(Self {
            proof: format!("0x{}", hex::encode(proof.serialize_proof()?)),
            public_inputs: proof.public_inputs.iter().map(fr_to_hex).collect(),
        })
    }
}

// ============ Health ============

/// Health check response
#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub test_height: usize,
    pub tree_depth: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        test_height: state.shape.test_height,
        tree_depth: state.shape.tree_depth,
    })
}

// ============ Grading ============

pub async fn grade(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AttemptJson>,
) -> Result<Json<GradeResponse>, ApiError> {
    let identity = req.identity.parse()?;
    let params = req.parameters.parse()?;
    let answer_hashes = fields("answer_hashes", &req.answer_hashes)?;

    let result = state.grader.grade(
        &identity,
        &req.multiple_choice_answers,
        &req.open_answers,
        &params,
        &answer_hashes,
    )?;

    Ok(Json(GradeResponse::from(&result)))
}

// ============ Test proof ============

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InsertionJson {
    pub grade: MerkleProofJson,
    pub credentials: MerkleProofJson,
    pub no_credentials: MerkleProofJson,
}

/// Extra proof required by the credential being attempted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestrictionJson {
    None,
    Credential {
        membership_proof: MerkleProofJson,
    },
    Grade {
        membership_proof: MerkleProofJson,
        weighted_grade: u64,
        grade_threshold: u64,
        n_questions: u64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProveTestRequest {
    pub credential_id: u64,
    #[serde(flatten)]
    pub attempt: AttemptJson,
    pub insertion: InsertionJson,
    pub restriction: RestrictionJson,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProveTestResponse {
    pub kind: RestrictionKind,
    /// Encoded credential update, ready to submit
    pub payload: String,
    pub grade: GradeResponse,
}

pub async fn prove_test(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProveTestRequest>,
) -> Result<Json<ProveTestResponse>, ApiError> {
    let depth = state.shape.tree_depth;
    let identity = req.attempt.identity.parse()?;
    let params = req.attempt.parameters.parse()?;
    let answer_hashes = fields("answer_hashes", &req.attempt.answer_hashes)?;
    let answers = state.grader.answer_witness(
        &req.attempt.multiple_choice_answers,
        &req.attempt.open_answers,
        &params,
        &answer_hashes,
    )?;

    let insertion = TestInsertion {
        grade: req.insertion.grade.parse(depth)?,
        credentials: req.insertion.credentials.parse(depth)?,
        no_credentials: req.insertion.no_credentials.parse(depth)?,
    };

    let restriction = match &req.restriction {
        RestrictionJson::None => RestrictionWitness::None,
        RestrictionJson::Credential { membership_proof } => RestrictionWitness::Credential {
            group: MembershipWitness::Proof(membership_proof.parse(depth)?),
        },
        RestrictionJson::Grade {
            membership_proof,
            weighted_grade,
            grade_threshold,
            n_questions,
        } => RestrictionWitness::Grade {
            grade_group: MembershipWitness::Proof(membership_proof.parse(depth)?),
            weighted_grade: *weighted_grade,
            grade_threshold: *grade_threshold,
            n_questions: *n_questions,
        },
    };

    let attempt = Attempt {
        credential_id: req.credential_id,
        identity,
        parameters: params,
        answers,
        insertion: &insertion,
    };

    // Run proof generation directly; spawn_blocking adds overhead with rayon.
    let (update, result) =
        compose_update(&state.oracle, &state.hasher, state.shape, attempt, restriction)?;

    debug!(
        credential_id = req.credential_id,
        kind = ?update.kind(),
        passed = result.passed,
        "test proof generated"
    );

    Ok(Json(ProveTestResponse {
        kind: update.kind(),
        payload: format!("0x{}", hex::encode(update.encode())),
        grade: GradeResponse::from(&result),
    }))
}

// ============ Ownership ============

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProveOwnershipRequest {
    pub identity: IdentityJson,
    pub membership_proof: MerkleProofJson,
    pub external_nullifier: String,
    pub signal_hash: String,
}

pub async fn prove_ownership(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProveOwnershipRequest>,
) -> Result<Json<ProofResponse>, ApiError> {
    let group = MembershipWitness::Proof(req.membership_proof.parse(state.shape.tree_depth)?);
    let circuit = ownership_circuit(
        &state.hasher,
        state.shape,
        req.identity.parse()?,
        &group,
        field("external_nullifier", &req.external_nullifier)?,
        field("signal_hash", &req.signal_hash)?,
    )?;

    let proof = state.oracle.prove(CircuitWitness::CredentialOwnership(circuit))?;
    Ok(Json(ProofResponse::try_from(&proof)?))
}

// ============ Grade claim ============

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProveGradeClaimRequest {
    pub identity: IdentityJson,
    pub membership_proof: MerkleProofJson,
    pub weighted_grade: u64,
    pub grade_threshold: u64,
    pub n_questions: u64,
    pub external_nullifier: String,
    pub signal_hash: String,
}

pub async fn prove_grade_claim(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProveGradeClaimRequest>,
) -> Result<Json<ProofResponse>, ApiError> {
    let grade_group =
        MembershipWitness::Proof(req.membership_proof.parse(state.shape.tree_depth)?);
    let claim = GradeClaim {
        weighted_grade: req.weighted_grade,
        grade_threshold: req.grade_threshold,
        n_questions: req.n_questions,
        external_nullifier: field("external_nullifier", &req.external_nullifier)?,
        signal_hash: field("signal_hash", &req.signal_hash)?,
    };
    let circuit = grade_claim_circuit(
        &state.hasher,
        state.shape,
        req.identity.parse()?,
        &grade_group,
        claim,
    )?;

    let proof = state.oracle.prove(CircuitWitness::GradeClaim(circuit))?;
    Ok(Json(ProofResponse::try_from(&proof)?))
}

// ============ Utilities ============

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateIdentityResponse {
    pub identity: IdentityJson,
    pub commitment: String,
}

pub async fn generate_identity(
    State(state): State<Arc<AppState>>,
) -> Json<GenerateIdentityResponse> {
    let mut rng = ark_std::rand::thread_rng();
    let identity = Identity::random(&mut rng);

    Json(GenerateIdentityResponse {
        identity: IdentityJson {
            nullifier: fr_to_hex(&identity.nullifier()),
            trapdoor: fr_to_hex(&identity.trapdoor()),
        },
        commitment: fr_to_hex(&identity.commitment(&state.hasher)),
    })
}
