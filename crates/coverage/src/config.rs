// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! Configuration is read from TOML. Every key is optional:
//!
//! ```toml
//! parallel = true
//! revert_heuristics = false
//! ```

use std::{fs, path::Path};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Knobs for coverage map generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Process the contracts of a batch in parallel
    pub parallel: bool,
    /// Detect the dispatcher's shared REVERT and attribute forwarded `revert()` jumps
    pub revert_heuristics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { parallel: true, revert_heuristics: true }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse engine config as TOML")
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config = Self::from_toml_str(&content)?;
        debug!("Loaded engine configuration from {path:?}");
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "Failed to serialize engine config to TOML")
    }
}
