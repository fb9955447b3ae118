use std::{fs, path::Path};

use depot_dl::endpoints::RegistryEndpoints;
use serde::Deserialize;

use crate::error::{ErrorContext, RegistryError, Result};

pub const INDEX_CONFIG_FILE: &str = "config.json";

/// The `config.json` at the root of a registry index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexConfig {
    /// Download base or template.
    pub dl: String,
    /// Web API root, e.g. `https://crates.io`.
    pub api: Option<String>,
}

impl IndexConfig {
    pub fn load(index_root: &Path) -> Result<Self> {
        let path = index_root.join(INDEX_CONFIG_FILE);
        let content =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).map_err(|source| RegistryError::InvalidConfig { path, source })
    }

    /// Metadata base: `api_override`, else `{api}/api/v1/crates`, else `dl`.
    pub fn metadata_base(&self, api_override: Option<&str>) -> String {
        if let Some(base) = api_override {
            return base.trim_end_matches('/').to_string();
        }
        match &self.api {
            Some(api) => format!("{}/api/v1/crates", api.trim_end_matches('/')),
            None => self.dl.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoints(&self, api_override: Option<&str>) -> Result<RegistryEndpoints> {
        Ok(RegistryEndpoints::new(
            &self.metadata_base(api_override),
            &self.dl,
        )?)
    }
}
