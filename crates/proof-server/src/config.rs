//! Server configuration, read from the TOML file named by `QUALIFIED_CONFIG`.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use qualified_circuits::{CircuitShape, DEFAULT_DEPTH, MAX_DEPTH, TEST_HEIGHT};

pub const CONFIG_ENV: &str = "QUALIFIED_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Directory holding the circuit keys; created by setup when missing
    pub keys_dir: PathBuf,
    pub shape: ShapeConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3001,
            keys_dir: PathBuf::from("keys"),
            shape: ShapeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub test_height: usize,
    pub tree_depth: usize,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            test_height: TEST_HEIGHT,
            tree_depth: DEFAULT_DEPTH,
        }
    }
}

impl From<ShapeConfig> for CircuitShape {
    fn from(shape: ShapeConfig) -> Self {
        CircuitShape::new(shape.test_height, shape.tree_depth)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl ServerConfig {
    /// Load from `QUALIFIED_CONFIG` if set, defaults otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port cannot be 0".into()));
        }

        if self.shape.test_height == 0 || self.shape.test_height > 16 {
            return Err(ConfigError::Invalid(format!(
                "shape.test_height {} outside 1..=16",
                self.shape.test_height
            )));
        }

        if self.shape.tree_depth == 0 || self.shape.tree_depth > MAX_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "shape.tree_depth {} outside 1..={}",
                self.shape.tree_depth, MAX_DEPTH
            )));
        }

        Ok(())
    }
}
