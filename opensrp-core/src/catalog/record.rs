//! Artifact metadata and content records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::ArtifactVersion;

/// Metadata for one stored version of an artifact (form, rules file, properties bundle)
///
/// Several records share an identifier; each upload of a new version is a
/// new record and existing records are never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadataRecord {
    /// Store-assigned handle
    pub id: u64,

    /// Artifact identifier, e.g. `opd/reg.json`
    pub identifier: String,

    /// Version of this record
    pub version: ArtifactVersion,

    /// Human-readable name given at upload time
    #[serde(default)]
    pub label: String,

    /// Application module the artifact belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    /// Free-form relation to another artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    /// Whether this is a validator artifact listing fields that must not be removed
    #[serde(default)]
    pub is_json_validator: bool,

    /// Whether the artifact is still a draft
    #[serde(default)]
    pub is_draft: bool,

    /// When the record was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Raw content of one artifact version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactContent {
    /// Same handle as the metadata record
    pub id: u64,

    /// File body exactly as uploaded (JSON, YAML or properties text)
    pub json: String,
}

/// Metadata and content delivered together to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteArtifact {
    pub client_form: ArtifactContent,
    pub client_form_metadata: ArtifactMetadataRecord,
}

/// Everything needed to admit a new artifact version; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDraft {
    pub identifier: String,
    pub version: ArtifactVersion,
    pub label: String,
    pub module: Option<String>,
    pub relation: Option<String>,
    pub is_json_validator: bool,
    pub is_draft: bool,
}

impl ArtifactDraft {
    /// Build the stored record once the store has picked an id
    pub fn into_record(self, id: u64, created_at: DateTime<Utc>) -> ArtifactMetadataRecord {
        ArtifactMetadataRecord {
            id,
            identifier: self.identifier,
            version: self.version,
            label: self.label,
            module: self.module,
            relation: self.relation,
            is_json_validator: self.is_json_validator,
            is_draft: self.is_draft,
            created_at,
        }
    }
}
