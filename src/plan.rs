//! Edit plan files
//!
//! A plan lists modifications to queue and inserts to place, in JSON or TOML:
//!
//! ```toml
//! eject = true
//!
//! [[modifications]]
//! type = "pause"
//! layer = 12
//! message = "Swap colour"
//!
//! [[inserts]]
//! label = "magnet"
//! height_mm = 3.0
//! diameter_mm = 6.0
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use layerkit_modifier::{InsertSpec, ModificationKind};
use serde::{Deserialize, Serialize};

/// Insert placement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRequest {
    #[serde(flatten)]
    pub insert: InsertSpec,
    /// Holes to fill; every scanned hole when empty
    #[serde(default)]
    pub hole_ids: Vec<String>,
}

/// Modifications and inserts to apply to one toolpath
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditPlan {
    pub modifications: Vec<ModificationKind>,
    pub inserts: Vec<InsertRequest>,
    /// Append the configured eject sequence
    pub eject: bool,
}

impl EditPlan {
    /// Load a plan from a `.json` or `.toml` file
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON plan {}", path.display())),
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML plan {}", path.display())),
            _ => bail!("Plan file must be .json or .toml: {}", path.display()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty() && self.inserts.is_empty() && !self.eject
    }
}
