//! Trusted setup utilities for generating proving and verifying keys.

use std::path::Path;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use qualified_circuits::{
    CircuitShape, CredentialOwnershipCircuit, GradeClaimCircuit, PoseidonHasher, TestCircuit,
};

use crate::oracle::CircuitId;

/// Errors that can occur during setup
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Circuit setup failed: {0}")]
    CircuitSetup(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
    #[error("Keys were generated for {found:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: CircuitShape,
        found: CircuitShape,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keys for a single circuit
#[derive(Clone)]
pub struct CircuitKeyPair {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl CircuitKeyPair {
    /// Serialize proving key to bytes
    pub fn serialize_pk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.proving_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize verifying key to bytes
    pub fn serialize_vk(&self) -> Result<Vec<u8>, SetupError> {
        let mut bytes = Vec::new();
        self.verifying_key
            .serialize_compressed(&mut bytes)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize proving key from bytes
    pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, SetupError> {
        ProvingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }

    /// Deserialize verifying key from bytes
    pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, SetupError> {
        VerifyingKey::deserialize_compressed(bytes)
            .map_err(|e| SetupError::Deserialization(e.to_string()))
    }

    fn save(&self, dir: &Path, name: &str) -> Result<(), SetupError> {
        std::fs::write(dir.join(format!("{}.pk", name)), self.serialize_pk()?)?;
        std::fs::write(dir.join(format!("{}.vk", name)), self.serialize_vk()?)?;
        Ok(())
    }

    fn load(dir: &Path, name: &str) -> Result<Self, SetupError> {
        Ok(Self {
            proving_key: Self::deserialize_pk(&std::fs::read(dir.join(format!("{}.pk", name)))?)?,
            verifying_key: Self::deserialize_vk(&std::fs::read(
                dir.join(format!("{}.vk", name)),
            )?)?,
        })
    }
}

/// On-disk record of the shape the keys were generated for.
#[derive(Serialize, Deserialize)]
struct ShapeFile {
    test_height: usize,
    tree_depth: usize,
}

/// All circuit keys for one circuit shape
#[derive(Clone)]
pub struct CircuitKeys {
    pub shape: CircuitShape,
    pub test: CircuitKeyPair,
    pub grade_claim: CircuitKeyPair,
    pub credential_ownership: CircuitKeyPair,
}

impl CircuitKeys {
    pub fn get(&self, circuit: CircuitId) -> &CircuitKeyPair {
        match circuit {
            CircuitId::Test => &self.test,
            CircuitId::GradeClaim => &self.grade_claim,
            CircuitId::CredentialOwnership => &self.credential_ownership,
        }
    }

    /// Save all keys to a directory
    pub fn save_to_directory(&self, dir: &Path) -> Result<(), SetupError> {
        std::fs::create_dir_all(dir)?;

        for circuit in CircuitId::ALL {
            self.get(circuit).save(dir, circuit.name())?;
        }

        let shape = ShapeFile {
            test_height: self.shape.test_height,
            tree_depth: self.shape.tree_depth,
        };
        let json = serde_json::to_string_pretty(&shape)
            .map_err(|e| SetupError::Serialization(e.to_string()))?;
        std::fs::write(dir.join("shape.json"), json)?;

        Ok(())
    }

    /// Load all keys from a directory
    pub fn load_from_directory(dir: &Path) -> Result<Self, SetupError> {
        let shape: ShapeFile = serde_json::from_slice(&std::fs::read(dir.join("shape.json"))?)
            .map_err(|e| SetupError::Deserialization(e.to_string()))?;

        Ok(Self {
            shape: CircuitShape::new(shape.test_height, shape.tree_depth),
            test: CircuitKeyPair::load(dir, CircuitId::Test.name())?,
            grade_claim: CircuitKeyPair::load(dir, CircuitId::GradeClaim.name())?,
            credential_ownership: CircuitKeyPair::load(dir, CircuitId::CredentialOwnership.name())?,
        })
    }

    /// Load keys and check they match the expected shape.
    pub fn load_for_shape(dir: &Path, expected: CircuitShape) -> Result<Self, SetupError> {
        let keys = Self::load_from_directory(dir)?;
        if keys.shape != expected {
            return Err(SetupError::ShapeMismatch {
                expected,
                found: keys.shape,
            });
        }
        Ok(keys)
    }
}

/// Run trusted setup for all circuits of one shape
pub fn setup_all_circuits(
    hasher: &PoseidonHasher,
    shape: CircuitShape,
) -> Result<CircuitKeys, SetupError> {
    // Fixed seed for reproducible keys; not a ceremony.
    let mut rng = StdRng::seed_from_u64(42);

    info!(?shape, "setting up test circuit");
    let test = setup_test(&mut rng, hasher, shape)?;

    info!(?shape, "setting up grade claim circuit");
    let grade_claim = setup_grade_claim(&mut rng, hasher, shape)?;

    info!(?shape, "setting up credential ownership circuit");
    let credential_ownership = setup_credential_ownership(&mut rng, hasher, shape)?;

    Ok(CircuitKeys {
        shape,
        test,
        grade_claim,
        credential_ownership,
    })
}

fn setup_circuit<C: ConstraintSynthesizer<ark_bn254::Fr>>(
    rng: &mut StdRng,
    circuit: C,
) -> Result<CircuitKeyPair, SetupError> {
    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, rng)
        .map_err(|e| SetupError::CircuitSetup(e.to_string()))?;

    Ok(CircuitKeyPair {
        proving_key: pk,
        verifying_key: vk,
    })
}

/// Setup TestCircuit
pub fn setup_test(
    rng: &mut StdRng,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
) -> Result<CircuitKeyPair, SetupError> {
    setup_circuit(rng, TestCircuit::empty(hasher.clone(), shape))
}

/// Setup GradeClaimCircuit
pub fn setup_grade_claim(
    rng: &mut StdRng,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
) -> Result<CircuitKeyPair, SetupError> {
    setup_circuit(rng, GradeClaimCircuit::empty(hasher.clone(), shape))
}

/// Setup CredentialOwnershipCircuit
pub fn setup_credential_ownership(
    rng: &mut StdRng,
    hasher: &PoseidonHasher,
    shape: CircuitShape,
) -> Result<CircuitKeyPair, SetupError> {
    setup_circuit(rng, CredentialOwnershipCircuit::empty(hasher.clone(), shape))
}
