//! Generation naming.
//!
//! A generation name is `{prefix}-{purpose}-{version}`. Activation cleanup
//! compares names exactly, so the version must be embedded verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Static,
    Tile,
}

impl Purpose {
    pub const ALL: [Purpose; 2] = [Purpose::Static, Purpose::Tile];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Static => "static",
            Purpose::Tile => "tile",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the current deployment's generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationNames {
    prefix: String,
    version: String,
}

impl GenerationNames {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self, purpose: Purpose) -> String {
        format!("{}-{}-{}", self.prefix, purpose, self.version)
    }

    pub fn static_name(&self) -> String {
        self.name(Purpose::Static)
    }

    pub fn tile_name(&self) -> String {
        self.name(Purpose::Tile)
    }

    /// True only for this deployment's static or tile generation.
    pub fn is_current(&self, name: &str) -> bool {
        Purpose::ALL.iter().any(|p| self.name(*p) == name)
    }
}
