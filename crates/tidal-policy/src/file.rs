//! Policy files: TOML documents with one `[[policy]]` table per policy.
//!
//! ```toml
//! [[policy]]
//! id = "web-cpu"
//! source = "local-cluster"
//! query = "avg_cpu"
//! interval = "30s"
//! target = { name = "local-cluster", config = { job = "web" } }
//! strategy = { name = "target-value", min = 1, max = 10, config = { target = "50" } }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use tidal_core::Policy;

use crate::error::PolicyFileError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PolicyFile {
    #[serde(default, rename = "policy")]
    pub policies: Vec<Policy>,
}

impl PolicyFile {
    pub fn from_file(path: &Path) -> Result<Self, PolicyFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, PolicyFileError> {
        let file: PolicyFile = toml::from_str(s)?;

        let mut seen = HashSet::new();
        for policy in &file.policies {
            if policy.id.trim().is_empty() {
                return Err(PolicyFileError::Invalid("policy with empty id".to_string()));
            }
            if !seen.insert(policy.id.as_str()) {
                return Err(PolicyFileError::Invalid(format!(
                    "duplicate policy id {:?}",
                    policy.id
                )));
            }
        }
        Ok(file)
    }
}
