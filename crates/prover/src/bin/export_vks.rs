//! Export verifying keys.
//!
//! Generates or loads the keys for one circuit shape and prints the
//! verifying keys as hex, also writing them to `verifying_keys.json`.
//!
//! Usage:
//!   export-vks [KEYS_DIR] [TEST_HEIGHT] [TREE_DEPTH]

use std::error::Error;
use std::path::PathBuf;

use qualified_circuits::{CircuitShape, PoseidonHasher};
use qualified_prover::{setup_all_circuits, CircuitId, CircuitKeys};

fn parse_shape(args: &[String]) -> Result<CircuitShape, Box<dyn Error>> {
    let default = CircuitShape::default();
    let test_height = match args.get(2) {
        Some(arg) => arg.parse()?,
        None => default.test_height,
    };
    let tree_depth = match args.get(3) {
        Some(arg) => arg.parse()?,
        None => default.tree_depth,
    };
    Ok(CircuitShape::new(test_height, tree_depth))
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let keys_dir = PathBuf::from(args.get(1).map(String::as_str).unwrap_or("keys"));
    let shape = parse_shape(&args)?;

    println!("Loading or generating circuit keys for {:?}...", shape);

    let keys = if keys_dir.join("shape.json").exists() {
        println!("Loading existing keys from {:?}", keys_dir);
        CircuitKeys::load_for_shape(&keys_dir, shape)?
    } else {
        println!("Running trusted setup (this may take a while)...");
        let keys = setup_all_circuits(&PoseidonHasher::new(), shape)?;
        keys.save_to_directory(&keys_dir)?;
        println!("Keys saved to {:?}", keys_dir);
        keys
    };

    println!("\n=== Verifying Keys ===\n");

    let mut json = serde_json::Map::new();
    json.insert(
        "shape".into(),
        serde_json::json!({
            "test_height": shape.test_height,
            "tree_depth": shape.tree_depth,
        }),
    );

    for circuit in CircuitId::ALL {
        let vk = keys.get(circuit).serialize_vk()?;
        let encoded = format!("0x{}", hex::encode(&vk));
        println!(
            "{} VK ({} bytes, {} public inputs):",
            circuit,
            vk.len(),
            circuit.public_input_count()
        );
        println!("{}\n", encoded);
        json.insert(format!("{}_vk", circuit.name()), encoded.into());
    }

    let json_path = keys_dir.join("verifying_keys.json");
    std::fs::write(
        &json_path,
        serde_json::to_string_pretty(&serde_json::Value::Object(json))?,
    )?;
    println!("JSON exported to {:?}", json_path);

    Ok(())
}
