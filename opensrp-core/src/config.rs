//! Service configuration
//!
//! Loaded from a YAML file; every section and key is optional.
//!
//! ```yaml
//! upload:
//!   maxBytes: 5242880
//!   jsonContentTypes: [application/json]
//!   yamlContentTypes: [application/x-yaml, text/yaml]
//!   propertiesContentTypes: [application/octet-stream]
//!   propertiesExtension: .properties
//! json:
//!   pretty: false
//! tasks:
//!   defaultLimit: 25
//!   maxIdsLimit: 5000
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    pub upload: UploadConfig,
    pub json: JsonConfig,
    pub tasks: TaskConfig,
}

/// Limits and accepted content types for artifact uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadConfig {
    /// Largest accepted upload
    pub max_bytes: usize,
    pub json_content_types: Vec<String>,
    pub yaml_content_types: Vec<String>,
    /// Content types under which properties bundles arrive
    pub properties_content_types: Vec<String>,
    /// File extension a properties upload must carry
    pub properties_extension: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            json_content_types: vec!["application/json".to_string()],
            yaml_content_types: vec!["application/x-yaml".to_string(), "text/yaml".to_string()],
            properties_content_types: vec!["application/octet-stream".to_string()],
            properties_extension: ".properties".to_string(),
        }
    }
}

/// Response serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonConfig {
    pub pretty: bool,
}

/// Task sync paging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskConfig {
    /// Page size when the client does not send one
    pub default_limit: usize,
    /// Upper bound for id listings
    pub max_ids_limit: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_ids_limit: 5000,
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml_ng::from_str(content).context("Failed to parse service configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults when it does not exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let upload = &self.upload;
        if upload.max_bytes == 0 {
            bail!("upload.maxBytes must be greater than zero");
        }
        if upload.json_content_types.is_empty() {
            bail!("upload.jsonContentTypes cannot be empty");
        }
        if upload.yaml_content_types.is_empty() {
            bail!("upload.yamlContentTypes cannot be empty");
        }
        if upload.properties_content_types.is_empty() {
            bail!("upload.propertiesContentTypes cannot be empty");
        }
        if !upload.properties_extension.starts_with('.') {
            bail!(
                "upload.propertiesExtension must start with '.', got '{}'",
                upload.properties_extension
            );
        }
        if self.tasks.default_limit == 0 || self.tasks.max_ids_limit == 0 {
            bail!("task limits must be greater than zero");
        }
        Ok(())
    }
}
