// SPDX-License-Identifier: Apache-2.0

//! Storage Read API usage mode

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Result size above which `auto` switches to the Storage Read API (10 MiB)
pub const STORAGE_API_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// How query results are read back: `true`, `false` or `auto`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageApiMode {
    /// Always read through the Storage Read API
    True,
    /// Always page through the REST API
    False,
    /// Decide per result from its size
    #[default]
    Auto,
}

impl StorageApiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageApiMode::True => "true",
            StorageApiMode::False => "false",
            StorageApiMode::Auto => "auto",
        }
    }

    /// Decide whether a result of `result_bytes` uses the Storage Read API.
    ///
    /// In `auto` mode the comparison is strict: a result of exactly
    /// [`STORAGE_API_THRESHOLD_BYTES`] stays on the REST path.
    pub fn should_use(&self, result_bytes: u64) -> bool {
        match self {
            StorageApiMode::True => true,
            StorageApiMode::False => false,
            StorageApiMode::Auto => result_bytes > STORAGE_API_THRESHOLD_BYTES,
        }
    }
}

impl fmt::Display for StorageApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageApiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(StorageApiMode::True),
            "false" => Ok(StorageApiMode::False),
            "auto" => Ok(StorageApiMode::Auto),
            _ => Err("expected true, false or auto".to_string()),
        }
    }
}
