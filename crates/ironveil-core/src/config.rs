//! Tunables, loadable from JSON.
//!
//! ```json
//! {
//!   "reseed": { "soft_threshold": 65536, "hard_threshold": 1048576 },
//!   "protection": { "mode": "state_and_code", "alert": "log" },
//!   "entropy_pool": "/var/lib/app/entropy.pool"
//! }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};
use crate::protected::ProtectionMode;

/// Default soft threshold, in state blocks generated since the last reseed.
pub const DEFAULT_SOFT_THRESHOLD: u64 = 65_536;
/// Default hard threshold, in state blocks generated since the last reseed.
pub const DEFAULT_HARD_THRESHOLD: u64 = 1_048_576;

/// When the fast generator draws fresh seed material from the slow one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReseedPolicy {
    /// Past this many blocks a background reseed is scheduled.
    pub soft_threshold: u64,
    /// Past this many blocks the call reseeds synchronously before generating.
    pub hard_threshold: u64,
    /// Seed bytes drawn per reseed. `None` means one digest.
    pub seed_size_bytes: Option<usize>,
}

impl Default for ReseedPolicy {
    fn default() -> Self {
        Self {
            soft_threshold: DEFAULT_SOFT_THRESHOLD,
            hard_threshold: DEFAULT_HARD_THRESHOLD,
            seed_size_bytes: None,
        }
    }
}

impl ReseedPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.soft_threshold == 0 {
            return Err(VeilError::InvalidConfiguration(
                "soft reseed threshold must be positive".into(),
            ));
        }
        if self.soft_threshold >= self.hard_threshold {
            return Err(VeilError::InvalidConfiguration(format!(
                "soft reseed threshold {} must be below hard threshold {}",
                self.soft_threshold, self.hard_threshold
            )));
        }
        if self.seed_size_bytes == Some(0) {
            return Err(VeilError::InvalidConfiguration(
                "reseed size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// How injection alerts are delivered, in serialisable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Suppressed,
    #[default]
    Log,
    Raise,
}

/// Defaults applied to containers created through a
/// [`SecurityContext`](crate::context::SecurityContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionDefaults {
    pub mode: ProtectionMode,
    pub alert: AlertKind,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub reseed: ReseedPolicy,
    pub protection: ProtectionDefaults,
    /// Persisted entropy pool added to the slow generator when set.
    pub entropy_pool: Option<PathBuf>,
}

impl ToolkitConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.reseed.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
