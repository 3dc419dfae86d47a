//! In-memory catalog backed by a lock-protected vector
//!
//! Used by the CLI (seeded from a YAML file) and by tests. Records keep
//! insertion order, which is the order `records_by_identifier` returns.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{
    ArtifactContent, ArtifactDraft, ArtifactMetadataRecord, ArtifactStore, CompleteArtifact,
    ManifestStore, ReleaseManifest, StoreResult,
};
use crate::error::StoreError;
use crate::version::ArtifactVersion;

/// Seed file layout (catalog.yaml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    /// Artifact versions with inline content
    #[serde(default)]
    pub forms: Vec<SeedArtifact>,

    /// Release manifests
    #[serde(default)]
    pub manifests: Vec<ReleaseManifest>,
}

/// One artifact version in a seed file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedArtifact {
    /// Explicit handle; assigned sequentially when omitted
    #[serde(default)]
    pub id: Option<u64>,
    pub identifier: String,
    pub version: ArtifactVersion,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub is_json_validator: bool,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// File body
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default)]
struct CatalogState {
    /// Highest id handed out so far; ids start at 1
    last_id: u64,
    records: Vec<ArtifactMetadataRecord>,
    contents: HashMap<u64, String>,
    manifests: Vec<ReleaseManifest>,
}

impl CatalogState {
    fn allocate_id(&mut self) -> Option<u64> {
        let id = self.last_id.checked_add(1)?;
        self.last_id = id;
        Some(id)
    }

    fn content(&self, id: u64) -> Option<ArtifactContent> {
        self.contents.get(&id).map(|json| ArtifactContent {
            id,
            json: json.clone(),
        })
    }
}

/// Thread-safe in-memory implementation of [`ArtifactStore`] and [`ManifestStore`]
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a parsed seed
    pub fn from_seed(seed: CatalogSeed) -> Result<Self> {
        let mut state = CatalogState::default();

        let explicit_ids: Vec<u64> = seed.forms.iter().filter_map(|f| f.id).collect();
        let mut seen = HashSet::new();
        for id in &explicit_ids {
            if !seen.insert(*id) {
                anyhow::bail!("Duplicate artifact id {} in catalog seed", id);
            }
        }
        state.last_id = explicit_ids.iter().copied().max().unwrap_or(0);

        for form in seed.forms {
            let id = match form.id {
                Some(id) => id,
                None => match state.allocate_id() {
                    Some(id) => id,
                    None => anyhow::bail!(
                        "No artifact id left for {} after id {}",
                        form.identifier,
                        state.last_id
                    ),
                },
            };
            let record = ArtifactMetadataRecord {
                id,
                identifier: form.identifier,
                version: form.version,
                label: form.label,
                module: form.module,
                relation: form.relation,
                is_json_validator: form.is_json_validator,
                is_draft: form.is_draft,
                created_at: form.created_at.unwrap_or_else(Utc::now),
            };
            state.contents.insert(id, form.content);
            state.records.push(record);
        }

        state.manifests = seed.manifests;
        debug!(
            "Seeded catalog with {} artifacts and {} manifests",
            state.records.len(),
            state.manifests.len()
        );

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Parse a seed from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Self::from_seed(CatalogSeed::default());
        }
        let seed: CatalogSeed =
            serde_yaml_ng::from_str(content).context("Failed to parse catalog seed YAML")?;
        Self::from_seed(seed)
    }

    /// Load a seed file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog seed: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to load catalog seed: {}", path.display()))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("catalog lock poisoned".to_string()))
    }
}

fn matches_variant(record: &ArtifactMetadataRecord, identifier: &str, is_json_validator: bool) -> bool {
    record.identifier == identifier && record.is_json_validator == is_json_validator
}

fn same_app_version(stored: Option<&str>, requested: &str) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    match (ArtifactVersion::parse(stored), ArtifactVersion::parse(requested)) {
        (Ok(a), Ok(b)) => a == b,
        _ => stored == requested,
    }
}

impl ArtifactStore for InMemoryCatalog {
    fn exists(&self, identifier: &str, is_json_validator: bool) -> StoreResult<bool> {
        Ok(self
            .read()?
            .records
            .iter()
            .any(|r| matches_variant(r, identifier, is_json_validator)))
    }

    fn records_by_identifier(
        &self,
        identifier: &str,
        is_json_validator: bool,
    ) -> StoreResult<Vec<ArtifactMetadataRecord>> {
        Ok(self
            .read()?
            .records
            .iter()
            .filter(|r| matches_variant(r, identifier, is_json_validator))
            .cloned()
            .collect())
    }

    fn record_by_identifier_and_version(
        &self,
        identifier: &str,
        version: &ArtifactVersion,
        is_json_validator: bool,
    ) -> StoreResult<Option<ArtifactMetadataRecord>> {
        Ok(self
            .read()?
            .records
            .iter()
            .filter(|r| matches_variant(r, identifier, is_json_validator) && &r.version == version)
            .max_by_key(|r| r.id)
            .cloned())
    }

    fn record_by_id(&self, id: u64) -> StoreResult<Option<ArtifactMetadataRecord>> {
        Ok(self.read()?.records.iter().find(|r| r.id == id).cloned())
    }

    fn content_by_id(&self, id: u64) -> StoreResult<Option<ArtifactContent>> {
        Ok(self.read()?.content(id))
    }

    fn most_recent_validator(&self, identifier: &str) -> StoreResult<Option<ArtifactContent>> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|r| matches_variant(r, identifier, true))
            .max_by_key(|r| (r.created_at, r.id))
            .and_then(|r| state.content(r.id)))
    }

    fn all_records(&self) -> StoreResult<Vec<ArtifactMetadataRecord>> {
        Ok(self.read()?.records.clone())
    }

    fn add_artifact(&self, draft: ArtifactDraft, content: String) -> StoreResult<CompleteArtifact> {
        let mut state = self.write()?;

        let duplicate = state.records.iter().any(|r| {
            matches_variant(r, &draft.identifier, draft.is_json_validator) && r.version == draft.version
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} version {} already exists",
                draft.identifier, draft.version
            )));
        }

        let Some(id) = state.allocate_id() else {
            return Err(StoreError::Unavailable(format!(
                "no artifact id left after {}",
                state.last_id
            )));
        };

        let record = draft.into_record(id, Utc::now());
        state.contents.insert(id, content.clone());
        state.records.push(record.clone());
        debug!("Stored {} version {} as #{}", record.identifier, record.version, id);

        Ok(CompleteArtifact {
            client_form: ArtifactContent { id, json: content },
            client_form_metadata: record,
        })
    }
}

impl ManifestStore for InMemoryCatalog {
    fn manifest(&self, identifier: &str) -> StoreResult<Option<ReleaseManifest>> {
        Ok(self
            .read()?
            .manifests
            .iter()
            .find(|m| m.identifier == identifier)
            .cloned())
    }

    fn manifests_by_app_id(&self, app_id: &str) -> StoreResult<Vec<ReleaseManifest>> {
        Ok(self
            .read()?
            .manifests
            .iter()
            .filter(|m| m.app_id.as_deref() == Some(app_id))
            .cloned()
            .collect())
    }

    fn manifest_by_app_id_and_version(
        &self,
        app_id: &str,
        app_version: &str,
    ) -> StoreResult<Option<ReleaseManifest>> {
        Ok(self
            .read()?
            .manifests
            .iter()
            .find(|m| {
                m.app_id.as_deref() == Some(app_id)
                    && same_app_version(m.app_version.as_deref(), app_version)
            })
            .cloned())
    }

    fn all_manifests(&self) -> StoreResult<Vec<ReleaseManifest>> {
        Ok(self.read()?.manifests.clone())
    }

    fn add_manifest(&self, mut manifest: ReleaseManifest) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.manifests.iter().any(|m| m.identifier == manifest.identifier) {
            return Err(StoreError::Conflict(format!(
                "manifest {} already exists",
                manifest.identifier
            )));
        }
        let now = Utc::now();
        manifest.created_at.get_or_insert(now);
        manifest.updated_at = Some(now);
        state.manifests.push(manifest);
        Ok(())
    }

    fn update_manifest(&self, mut manifest: ReleaseManifest) -> StoreResult<()> {
        let mut state = self.write()?;
        let existing = state
            .manifests
            .iter_mut()
            .find(|m| m.identifier == manifest.identifier)
            .ok_or_else(|| {
                StoreError::Conflict(format!("manifest {} does not exist", manifest.identifier))
            })?;
        manifest.created_at = existing.created_at;
        manifest.updated_at = Some(Utc::now());
        *existing = manifest;
        Ok(())
    }

    fn delete_manifest(&self, identifier: &str) -> StoreResult<()> {
        self.write()?.manifests.retain(|m| m.identifier != identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
forms:
  - identifier: opd/reg.json
    version: 0.0.1
    label: Registration
    content: "{}"
  - id: 10
    identifier: opd/reg.json
    version: 0.0.2
    content: "{\"count\": 2}"
  - identifier: opd/reg.json
    version: 0.0.1
    isJsonValidator: true
    content: '{"cannot_remove": {"fields": ["first_name"]}}'
manifests:
  - identifier: "1.0.0"
    appId: org.smartregister.opd
    appVersion: "1.0.0"
    json: '{"identifiers": ["opd/reg.json"]}'
"#;

    fn version(s: &str) -> ArtifactVersion {
        ArtifactVersion::parse(s).unwrap()
    }

    #[test]
    fn test_seed_assigns_ids_after_explicit_ones() {
        let catalog = InMemoryCatalog::from_yaml(SEED).unwrap();
        let records = catalog.all_records().unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![11, 10, 12]);
    }

    #[test]
    fn test_duplicate_seed_ids_are_rejected() {
        let seed = r#"
forms:
  - { id: 1, identifier: a.json, version: "1" }
  - { id: 1, identifier: b.json, version: "1" }
"#;
        let err = InMemoryCatalog::from_yaml(seed).unwrap_err();
        assert!(err.to_string().contains("Duplicate artifact id"));
    }

    #[test]
    fn test_validator_variant_is_kept_apart() {
        let catalog = InMemoryCatalog::from_yaml(SEED).unwrap();
        assert_eq!(catalog.records_by_identifier("opd/reg.json", false).unwrap().len(), 2);
        assert_eq!(catalog.records_by_identifier("opd/reg.json", true).unwrap().len(), 1);
        assert!(!catalog.exists("opd/other.json", false).unwrap());

        let validator = catalog.most_recent_validator("opd/reg.json").unwrap().unwrap();
        assert!(validator.json.contains("cannot_remove"));
    }

    #[test]
    fn test_exact_lookup_uses_version_equality() {
        let catalog = InMemoryCatalog::from_yaml(SEED).unwrap();
        let record = catalog
            .record_by_identifier_and_version("opd/reg.json", &version("0.0.2.0"), false)
            .unwrap()
            .unwrap();
        assert_eq!(record.id, 10);
        assert_eq!(catalog.content_by_id(10).unwrap().unwrap().json, "{\"count\": 2}");
    }

    #[test]
    fn test_add_artifact_rejects_duplicate_version() {
        let catalog = InMemoryCatalog::from_yaml(SEED).unwrap();
        let draft = ArtifactDraft {
            identifier: "opd/reg.json".to_string(),
            version: version("0.0.2"),
            label: "Registration".to_string(),
            module: None,
            relation: None,
            is_json_validator: false,
            is_draft: false,
        };
        let err = catalog.add_artifact(draft.clone(), "{}".into()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let stored = catalog
            .add_artifact(
                ArtifactDraft {
                    version: version("0.0.3"),
                    ..draft
                },
                "{}".into(),
            )
            .unwrap();
        assert_eq!(stored.client_form_metadata.id, 13);
        assert_eq!(stored.client_form.id, 13);
    }

    #[test]
    fn test_manifest_lookup_and_updates() {
        let catalog = InMemoryCatalog::from_yaml(SEED).unwrap();
        assert!(catalog.manifest("1.0.0").unwrap().is_some());
        assert!(catalog
            .manifest_by_app_id_and_version("org.smartregister.opd", "1.0")
            .unwrap()
            .is_some());

        let duplicate = ReleaseManifest::new("1.0.0", "{}");
        assert!(catalog.add_manifest(duplicate.clone()).is_err());

        catalog.update_manifest(duplicate).unwrap();
        assert_eq!(catalog.manifest("1.0.0").unwrap().unwrap().json, "{}");

        catalog.delete_manifest("1.0.0").unwrap();
        assert!(catalog.all_manifests().unwrap().is_empty());
    }

    #[test]
    fn test_highest_possible_seed_id() {
        let catalog =
            InMemoryCatalog::from_yaml("forms:\n  - { id: 18446744073709551615, identifier: a.json, version: \"1\" }")
                .unwrap();
        assert_eq!(catalog.all_records().unwrap()[0].id, u64::MAX);

        let draft = ArtifactDraft {
            identifier: "b.json".to_string(),
            version: version("1"),
            label: "B".to_string(),
            module: None,
            relation: None,
            is_json_validator: false,
            is_draft: false,
        };
        let err = catalog.add_artifact(draft, "{}".into()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(catalog.all_records().unwrap().len(), 1);

        let seed = r#"
forms:
  - { id: 18446744073709551615, identifier: a.json, version: "1" }
  - { identifier: b.json, version: "1" }
"#;
        let err = InMemoryCatalog::from_yaml(seed).unwrap_err();
        assert!(err.to_string().contains("No artifact id left for b.json"));
    }
}
