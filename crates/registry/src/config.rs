//! Registry configuration.

use serde::{Deserialize, Serialize};

use qualified_circuits::{DEFAULT_DEPTH, MAX_DEPTH, TEST_HEIGHT};

use crate::error::{RegistryError, RegistryResult};

/// Largest supported answer tree height.
pub const MAX_TEST_HEIGHT: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seconds a replaced root stays usable for nullifier-consuming proofs
    pub root_validity_secs: u64,
    pub min_tree_depth: usize,
    pub max_tree_depth: usize,
    /// Height of the answer trees of every test
    pub test_height: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root_validity_secs: 3600,
            min_tree_depth: DEFAULT_DEPTH,
            max_tree_depth: MAX_DEPTH,
            test_height: TEST_HEIGHT,
        }
    }
}

impl RegistryConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(input: &str) -> RegistryResult<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| RegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if self.min_tree_depth == 0 {
            return Err(RegistryError::Config(
                "min_tree_depth must be at least 1".into(),
            ));
        }

        if self.min_tree_depth > self.max_tree_depth {
            return Err(RegistryError::Config(format!(
                "min_tree_depth {} exceeds max_tree_depth {}",
                self.min_tree_depth, self.max_tree_depth
            )));
        }

        if self.max_tree_depth > MAX_DEPTH {
            return Err(RegistryError::Config(format!(
                "max_tree_depth cannot exceed {}",
                MAX_DEPTH
            )));
        }

        if self.test_height == 0 || self.test_height > MAX_TEST_HEIGHT {
            return Err(RegistryError::Config(format!(
                "test_height must be within 1..={}",
                MAX_TEST_HEIGHT
            )));
        }

        Ok(())
    }
}
