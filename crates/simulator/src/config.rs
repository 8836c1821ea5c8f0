use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arch::Architecture;

/// Configuration result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Byte order used to assemble multi-byte values from memory.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    pub fn is_big(&self) -> bool {
        matches!(self, Endianness::Big)
    }
}

/// Settings for a simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    pub arch: Architecture,

    #[serde(default)]
    pub endianness: Endianness,

    /// Replacement 4-byte values for global addresses, both written in hexadecimal.
    #[serde(default)]
    pub patched_globals: BTreeMap<String, String>,

    /// Strings placed above the initial stack pointer when the stack is first accessed.
    #[serde(default)]
    pub environment: Vec<String>,

    /// Upper bound on the number of instructions executed by the driver.
    #[serde(default = "SimulatorConfig::default_max_steps")]
    pub max_steps: usize,
}

impl SimulatorConfig {
    const fn default_max_steps() -> usize {
        10_000
    }

    pub fn new(arch: Architecture, endianness: Endianness) -> Self {
        Self {
            arch,
            endianness,
            patched_globals: Default::default(),
            environment: Default::default(),
            max_steps: Self::default_max_steps(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
