//! Release manifests
//!
//! A manifest ties an application release to the artifacts it ships with.
//! Its `json` payload is stored verbatim; the `identifiers` array inside it
//! names the forms, rules and property files that belong to the release:
//!
//! ```json
//! { "forms_version": "1.0.4", "identifiers": ["anc/reg.json", "anc/rules.yml"] }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the artifact list inside a manifest payload
pub const MANIFEST_IDENTIFIERS: &str = "identifiers";

/// A release manifest as held by the manifest store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    /// Release identifier
    pub identifier: String,

    /// Application the release belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Application version of the release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// JSON payload
    #[serde(default)]
    pub json: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReleaseManifest {
    /// Create a manifest with just an identifier and payload
    pub fn new(identifier: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            app_id: None,
            app_version: None,
            json: json.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Attach the application id and version
    pub fn with_app(mut self, app_id: impl Into<String>, app_version: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self.app_version = Some(app_version.into());
        self
    }

    /// Whether the manifest carries any payload at all
    pub fn has_payload(&self) -> bool {
        !self.json.trim().is_empty()
    }
}
