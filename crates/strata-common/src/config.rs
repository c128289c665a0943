use crate::error::StrataError;
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tool configuration, usually read from a JSON file. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Minimum log severity that gets printed.
    pub log_level: String,
    /// Abort a region load on the first bad chunk instead of skipping it.
    pub fail_fast: bool,
    /// Reject chunks whose declared length runs past their allocated sectors.
    pub check_sector_bounds: bool,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            fail_fast: false,
            check_sector_bounds: true,
        }
    }
}

impl StrataConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StrataError::Config(e.to_string()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| StrataError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}
