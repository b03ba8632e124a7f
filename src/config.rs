//! Engine configuration
//!
//! Every field has a serde default, so a partial JSON document (or `{}`)
//! yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compliance::DEFAULT_JURISDICTION;
use crate::error::{LendingError, LendingResult};
use crate::fees::FeeSchedule;
use crate::schedule::AmortizationMethod;

fn default_jurisdiction() -> String {
    DEFAULT_JURISDICTION.to_string()
}

fn default_true() -> bool {
    true
}

/// Deployment-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Jurisdiction applied to offers that do not name one
    #[serde(default = "default_jurisdiction")]
    pub default_jurisdiction: String,

    #[serde(default)]
    pub amortization: AmortizationMethod,

    #[serde(default)]
    pub fees: FeeSchedule,

    /// Give a cancelled contract's principal back to its offer
    #[serde(default = "default_true")]
    pub restore_capacity_on_cancel: bool,

    /// Ask the injected risk source for a fresh assessment at origination
    #[serde(default = "default_true")]
    pub reassess_at_origination: bool,

    /// Jurisdiction table CSV; the built-in table is used when unset
    #[serde(default)]
    pub jurisdictions_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_jurisdiction: default_jurisdiction(),
            amortization: AmortizationMethod::default(),
            fees: FeeSchedule::default(),
            restore_capacity_on_cancel: true,
            reassess_at_origination: true,
            jurisdictions_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> LendingResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> LendingResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> LendingResult<()> {
        if self.default_jurisdiction.trim().is_empty() {
            return Err(LendingError::invalid("default_jurisdiction", "must not be empty"));
        }
        self.fees.validate()
    }
}
