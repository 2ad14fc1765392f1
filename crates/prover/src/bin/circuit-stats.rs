//! Circuit statistics utility - reports constraint counts and proof timing
//!
//! Usage:
//!   cargo run --release --bin circuit-stats                  # Just constraint counts
//!   cargo run --release --bin circuit-stats -- --time KEYS   # Include proof timing

use std::path::Path;
use std::time::Instant;

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};

use qualified_circuits::{
    CircuitShape, CredentialOwnershipCircuit, GradeClaimCircuit, PoseidonHasher, TestCircuit,
};
use qualified_prover::{CircuitId, CircuitKeys, CircuitWitness, Groth16Oracle, ProofOracle};

fn count_constraints<C: ConstraintSynthesizer<Fr>>(circuit: C, name: &str) -> usize {
    let cs = ConstraintSystem::<Fr>::new_ref();
    if let Err(e) = circuit.generate_constraints(cs.clone()) {
        println!("{:25} failed: {}", name, e);
        return 0;
    }
    // Empty circuits carry dummy witnesses; the count is still exact.
    let count = cs.num_constraints();
    println!("{:25} {:>8} constraints", name, count);
    count
}

fn empty_witness(circuit: CircuitId, hasher: &PoseidonHasher, shape: CircuitShape) -> CircuitWitness {
    match circuit {
        CircuitId::Test => CircuitWitness::Test(TestCircuit::empty(hasher.clone(), shape)),
        CircuitId::GradeClaim => {
            CircuitWitness::GradeClaim(GradeClaimCircuit::empty(hasher.clone(), shape))
        }
        CircuitId::CredentialOwnership => CircuitWitness::CredentialOwnership(
            CredentialOwnershipCircuit::empty(hasher.clone(), shape),
        ),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let timing_dir = args
        .iter()
        .position(|a| a == "--time")
        .map(|i| args.get(i + 1).map(String::as_str).unwrap_or("keys"));

    let hasher = PoseidonHasher::new();
    let shape = CircuitShape::default();

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║             BLOCK QUALIFIED CIRCUIT STATS                ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Test height: {} ({} questions max)", shape.test_height, shape.width());
    println!("Tree depth:  {} ({} members max)\n", shape.tree_depth, 1u64 << shape.tree_depth);

    println!("─────────────────────────────────────────────────────────────");
    println!("CIRCUIT CONSTRAINTS:");
    println!("─────────────────────────────────────────────────────────────\n");

    let test_count = count_constraints(TestCircuit::empty(hasher.clone(), shape), "Test");
    let claim_count =
        count_constraints(GradeClaimCircuit::empty(hasher.clone(), shape), "GradeClaim");
    let ownership_count = count_constraints(
        CredentialOwnershipCircuit::empty(hasher.clone(), shape),
        "CredentialOwnership",
    );

    println!(
        "\nTotal constraints (all circuits): {}",
        test_count + claim_count + ownership_count
    );

    match timing_dir {
        Some(dir) => run_timing_benchmarks(Path::new(dir), &hasher),
        None => println!("\n(Run with --time [KEYS_DIR] to include proof generation timing)"),
    }
}

fn run_timing_benchmarks(keys_path: &Path, hasher: &PoseidonHasher) {
    const RUNS: usize = 3;

    println!("\n─────────────────────────────────────────────────────────────");
    println!("PROOF TIMING:");
    println!("─────────────────────────────────────────────────────────────\n");

    println!("Loading keys from {:?}...", keys_path);
    let start = Instant::now();
    let keys = match CircuitKeys::load_from_directory(keys_path) {
        Ok(k) => k,
        Err(e) => {
            println!("Failed to load keys: {}", e);
            println!("Generate keys first with: cargo run --release --bin export-vks");
            return;
        }
    };
    println!("Keys loaded in {:?}\n", start.elapsed());

    let shape = keys.shape;
    let oracle = Groth16Oracle::new(std::sync::Arc::new(keys));

    println!("Circuit               Avg Time");
    println!("──────────────────────────────");

    for circuit in CircuitId::ALL {
        let mut times = Vec::with_capacity(RUNS);
        for _ in 0..RUNS {
            let witness = empty_witness(circuit, hasher, shape);
            let start = Instant::now();
            if let Err(e) = oracle.prove(witness) {
                println!("{:20}  failed: {}", circuit.name(), e);
                break;
            }
            times.push(start.elapsed().as_micros());
        }
        if times.len() == RUNS {
            let avg_us = times.iter().sum::<u128>() / RUNS as u128;
            println!("{:20}  {:>6}ms", circuit.name(), avg_us / 1000);
        }
    }
}
