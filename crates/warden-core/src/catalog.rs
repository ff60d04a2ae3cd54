//! Static catalog of apps, policies and API keys loaded from YAML.
//!
//! ```yaml
//! apps:
//!   - id: planner
//!     name: Planner
//!     type: AGENT
//!   - id: github-mcp
//!     type: MCP_SERVER
//!     resolver_metadata_id: github
//! policies:
//!   - id: planner-policy
//!     assigned_to: planner
//!     rules:
//!       - id: allow-issues
//!         action: ALLOW
//!         needs_approval: true
//!         tasks:
//!           - app_id: github-mcp
//!             tool_name: create_issue
//! api_keys:
//!   - digest: 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//!     app_id: planner
//! ```
//!
//! API keys are stored as SHA-256 hex digests, never in clear.

use crate::model::{App, Policy};
use crate::store::{AppDirectory, PolicySource, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyEntry {
    /// Lowercase SHA-256 hex digest of the key.
    pub digest: String,
    /// Set for app-scoped keys; `None` for user keys.
    pub app_id: Option<String>,
    pub name: Option<String>,
    /// Owner of a user-scoped key.
    pub user_id: Option<String>,
}

impl ApiKeyEntry {
    pub fn is_app_scoped(&self) -> bool {
        self.app_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub apps: Vec<App>,
    pub policies: Vec<Policy>,
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml(&raw)?;
        tracing::info!(
            event = "catalog.loaded",
            path = %path.display(),
            apps = catalog.apps.len(),
            policies = catalog.policies.len(),
            api_keys = catalog.api_keys.len(),
        );
        Ok(catalog)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = serde_yaml::from_str(raw)?;
        catalog.normalize();
        catalog.validate()?;
        Ok(catalog)
    }

    fn normalize(&mut self) {
        for policy in &mut self.policies {
            for rule in &mut policy.rules {
                if rule.policy_id.is_empty() {
                    rule.policy_id = policy.id.clone();
                }
            }
        }
        for key in &mut self.api_keys {
            key.digest = key.digest.trim().to_ascii_lowercase();
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut ids = HashSet::new();
        for app in &self.apps {
            if app.id.is_empty() {
                return Err(CatalogError::Invalid("app with empty id".into()));
            }
            if !ids.insert(app.id.as_str()) {
                return Err(CatalogError::Invalid(format!("duplicate app id '{}'", app.id)));
            }
        }
        for key in &self.api_keys {
            if key.digest.len() != 64 || !key.digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(CatalogError::Invalid(format!(
                    "api key {} is not a sha256 hex digest",
                    key.name.as_deref().unwrap_or("<unnamed>")
                )));
            }
        }
        Ok(())
    }

    pub fn api_key_by_digest(&self, digest: &str) -> Option<&ApiKeyEntry> {
        self.api_keys
            .iter()
            .find(|key| key.digest.eq_ignore_ascii_case(digest))
    }
}

impl AppDirectory for Catalog {
    fn get_app(&self, app_id: &str) -> Result<App, StoreError> {
        self.apps
            .iter()
            .find(|app| app.id == app_id)
            .cloned()
            .ok_or_else(|| StoreError::AppNotFound {
                app_id: app_id.to_string(),
            })
    }

    fn get_app_by_resolver_metadata_id(&self, resolver_id: &str) -> Result<App, StoreError> {
        self.apps
            .iter()
            .find(|app| app.resolver_metadata_id.as_deref() == Some(resolver_id))
            .cloned()
            .ok_or_else(|| StoreError::AppNotFound {
                app_id: resolver_id.to_string(),
            })
    }
}

impl PolicySource for Catalog {
    fn policies_for_app(&self, app_id: &str) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .policies
            .iter()
            .filter(|policy| policy.assigned_to == app_id)
            .cloned()
            .collect())
    }
}
