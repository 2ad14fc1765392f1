//! Prove/verify oracle used by the credential registry.
//!
//! The registry only needs two operations: turn an assigned circuit into a
//! proof, and check a proof against public inputs. `Groth16Oracle` backs
//! both with the keys of one circuit shape.

use std::fmt;
use std::sync::Arc;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, Proof};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, SynthesisError};
use tracing::debug;

use qualified_circuits::{CredentialOwnershipCircuit, GradeClaimCircuit, TestCircuit};

use crate::prove::{prove_circuit, ProofWithInputs, ProveError};
use crate::setup::CircuitKeys;
use crate::verify::VerifyError;

/// The three proof statements of the system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CircuitId {
    Test,
    GradeClaim,
    CredentialOwnership,
}

impl CircuitId {
    pub const ALL: [CircuitId; 3] = [
        CircuitId::Test,
        CircuitId::GradeClaim,
        CircuitId::CredentialOwnership,
    ];

    /// File stem and display name.
    pub fn name(&self) -> &'static str {
        match self {
            CircuitId::Test => "test",
            CircuitId::GradeClaim => "grade_claim",
            CircuitId::CredentialOwnership => "credential_ownership",
        }
    }

    /// Number of public inputs the circuit exposes.
    pub fn public_input_count(&self) -> usize {
        match self {
            CircuitId::Test => 11,
            CircuitId::GradeClaim => 6,
            CircuitId::CredentialOwnership => 4,
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An assigned circuit ready to be proven.
#[derive(Clone)]
pub enum CircuitWitness {
    Test(TestCircuit),
    GradeClaim(GradeClaimCircuit),
    CredentialOwnership(CredentialOwnershipCircuit),
}

impl CircuitWitness {
    pub fn id(&self) -> CircuitId {
        match self {
            CircuitWitness::Test(_) => CircuitId::Test,
            CircuitWitness::GradeClaim(_) => CircuitId::GradeClaim,
            CircuitWitness::CredentialOwnership(_) => CircuitId::CredentialOwnership,
        }
    }

    /// Public inputs in circuit order, if fully assigned.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        match self {
            CircuitWitness::Test(c) => c.public_inputs(),
            CircuitWitness::GradeClaim(c) => c.public_inputs(),
            CircuitWitness::CredentialOwnership(c) => c.public_inputs(),
        }
    }

    /// Synthesize into a fresh constraint system and check satisfaction.
    pub fn is_satisfied(&self) -> Result<bool, SynthesisError> {
        let cs = ConstraintSystem::<Fr>::new_ref();
        match self.clone() {
            CircuitWitness::Test(c) => c.generate_constraints(cs.clone())?,
            CircuitWitness::GradeClaim(c) => c.generate_constraints(cs.clone())?,
            CircuitWitness::CredentialOwnership(c) => c.generate_constraints(cs.clone())?,
        }
        cs.is_satisfied()
    }
}

/// Opaque prove/verify interface.
///
/// `verify` must be deterministic and free of side effects.
pub trait ProofOracle: Send + Sync {
    fn prove(&self, witness: CircuitWitness) -> Result<ProofWithInputs, ProveError>;

    fn verify(
        &self,
        circuit: CircuitId,
        proof: &Proof<Bn254>,
        public_inputs: &[Fr],
    ) -> Result<bool, VerifyError>;
}

impl<O: ProofOracle + ?Sized> ProofOracle for Arc<O> {
    fn prove(&self, witness: CircuitWitness) -> Result<ProofWithInputs, ProveError> {
        (**self).prove(witness)
    }

    fn verify(
        &self,
        circuit: CircuitId,
        proof: &Proof<Bn254>,
        public_inputs: &[Fr],
    ) -> Result<bool, VerifyError> {
        (**self).verify(circuit, proof, public_inputs)
    }
}

/// Groth16 over BN254 with keys for one circuit shape.
#[derive(Clone)]
pub struct Groth16Oracle {
    keys: Arc<CircuitKeys>,
    test_pvk: PreparedVerifyingKey<Bn254>,
    grade_claim_pvk: PreparedVerifyingKey<Bn254>,
    ownership_pvk: PreparedVerifyingKey<Bn254>,
}

impl Groth16Oracle {
    pub fn new(keys: Arc<CircuitKeys>) -> Self {
        Self {
            test_pvk: prepare_verifying_key(&keys.test.verifying_key),
            grade_claim_pvk: prepare_verifying_key(&keys.grade_claim.verifying_key),
            ownership_pvk: prepare_verifying_key(&keys.credential_ownership.verifying_key),
            keys,
        }
    }

    pub fn keys(&self) -> &CircuitKeys {
        &self.keys
    }

    fn prepared(&self, circuit: CircuitId) -> &PreparedVerifyingKey<Bn254> {
        match circuit {
            CircuitId::Test => &self.test_pvk,
            CircuitId::GradeClaim => &self.grade_claim_pvk,
            CircuitId::CredentialOwnership => &self.ownership_pvk,
        }
    }
}

impl ProofOracle for Groth16Oracle {
    fn prove(&self, witness: CircuitWitness) -> Result<ProofWithInputs, ProveError> {
        let id = witness.id();
        let public_inputs = witness
            .public_inputs()
            .ok_or_else(|| ProveError::InvalidWitness(format!("unassigned {} circuit", id)))?;
        let pk = &self.keys.get(id).proving_key;

        debug!(circuit = %id, "generating proof");
        match witness {
            CircuitWitness::Test(c) => prove_circuit(pk, c, public_inputs),
            CircuitWitness::GradeClaim(c) => prove_circuit(pk, c, public_inputs),
            CircuitWitness::CredentialOwnership(c) => prove_circuit(pk, c, public_inputs),
        }
    }

    fn verify(
        &self,
        circuit: CircuitId,
        proof: &Proof<Bn254>,
        public_inputs: &[Fr],
    ) -> Result<bool, VerifyError> {
        if public_inputs.len() != circuit.public_input_count() {
            return Err(VerifyError::InvalidInputs);
        }

        Groth16::<Bn254>::verify_proof(self.prepared(circuit), proof, public_inputs)
            .map_err(|e| VerifyError::Verification(e.to_string()))
    }
}
