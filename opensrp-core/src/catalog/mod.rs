//! Artifact catalog - records, manifests and the store seams
//!
//! The core never owns persistence. Every request reads the slice of the
//! catalog it needs through the traits below and works on that snapshot.
//!
//! ```text
//! request ──▶ VersionResolver ──▶ ArtifactStore   (records, content, validators)
//!        └──▶ ManifestExpander ─▶ ManifestStore   (release manifests)
//! ```
//!
//! [`InMemoryCatalog`] implements both traits and can be seeded from YAML,
//! which is what the CLI and the tests use.

mod manifest;
mod memory;
mod record;

pub use manifest::{ReleaseManifest, MANIFEST_IDENTIFIERS};
pub use memory::{CatalogSeed, InMemoryCatalog, SeedArtifact};
pub use record::{ArtifactContent, ArtifactDraft, ArtifactMetadataRecord, CompleteArtifact};

use crate::error::StoreError;
use crate::version::ArtifactVersion;

/// Result type for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Access to artifact records and their content
pub trait ArtifactStore: Send + Sync {
    /// Whether any record exists for the identifier and validator variant
    fn exists(&self, identifier: &str, is_json_validator: bool) -> StoreResult<bool>;

    /// All records for the identifier and validator variant, in store order
    fn records_by_identifier(
        &self,
        identifier: &str,
        is_json_validator: bool,
    ) -> StoreResult<Vec<ArtifactMetadataRecord>>;

    /// The record with exactly this version, if one exists
    fn record_by_identifier_and_version(
        &self,
        identifier: &str,
        version: &ArtifactVersion,
        is_json_validator: bool,
    ) -> StoreResult<Option<ArtifactMetadataRecord>>;

    /// Look a record up by handle
    fn record_by_id(&self, id: u64) -> StoreResult<Option<ArtifactMetadataRecord>>;

    /// Content stored for a record
    fn content_by_id(&self, id: u64) -> StoreResult<Option<ArtifactContent>>;

    /// Content of the newest validator artifact attached to an identifier
    fn most_recent_validator(&self, identifier: &str) -> StoreResult<Option<ArtifactContent>>;

    /// Every record, validators and drafts included
    fn all_records(&self) -> StoreResult<Vec<ArtifactMetadataRecord>>;

    /// Admit a new artifact version
    fn add_artifact(&self, draft: ArtifactDraft, content: String) -> StoreResult<CompleteArtifact>;
}

/// Access to release manifests
pub trait ManifestStore: Send + Sync {
    /// Manifest by release identifier
    fn manifest(&self, identifier: &str) -> StoreResult<Option<ReleaseManifest>>;

    /// All manifests published for an application
    fn manifests_by_app_id(&self, app_id: &str) -> StoreResult<Vec<ReleaseManifest>>;

    /// The manifest for exactly this application version
    fn manifest_by_app_id_and_version(
        &self,
        app_id: &str,
        app_version: &str,
    ) -> StoreResult<Option<ReleaseManifest>>;

    /// Every manifest
    fn all_manifests(&self) -> StoreResult<Vec<ReleaseManifest>>;

    /// Store a new manifest
    fn add_manifest(&self, manifest: ReleaseManifest) -> StoreResult<()>;

    /// Replace the manifest with the same identifier
    fn update_manifest(&self, manifest: ReleaseManifest) -> StoreResult<()>;

    /// Remove a manifest
    fn delete_manifest(&self, identifier: &str) -> StoreResult<()>;
}
