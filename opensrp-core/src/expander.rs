//! Expansion of a release manifest into the artifacts it ships with

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{ArtifactMetadataRecord, ManifestStore, MANIFEST_IDENTIFIERS};
use crate::error::{ApiError, ApiResult};
use crate::resolver::VersionResolver;

/// Resolves every identifier listed in a release manifest to its newest record
#[derive(Clone)]
pub struct ReleaseManifestExpander {
    manifests: Arc<dyn ManifestStore>,
    resolver: VersionResolver,
}

impl ReleaseManifestExpander {
    pub fn new(manifests: Arc<dyn ManifestStore>, resolver: VersionResolver) -> Self {
        Self {
            manifests,
            resolver,
        }
    }

    /// Records for the release, in the order the manifest declares them
    ///
    /// Identifiers with no resolvable record are left out. A missing manifest,
    /// an empty payload and an empty identifier list are reported as errors so
    /// the caller can tell them apart from a successful expansion.
    pub fn expand(&self, release_identifier: &str) -> ApiResult<Vec<ArtifactMetadataRecord>> {
        let release_identifier = release_identifier.trim();
        if release_identifier.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Request parameter cannot be empty".to_string(),
            ));
        }

        let manifest = self
            .manifests
            .manifest(release_identifier)?
            .filter(|m| m.has_payload())
            .ok_or_else(|| ApiError::ManifestNotFound(release_identifier.to_string()))?;

        let payload: Value =
            serde_json::from_str(&manifest.json).map_err(|e| ApiError::CorruptManifest {
                identifier: release_identifier.to_string(),
                reason: e.to_string(),
            })?;

        let identifiers = match payload.get(MANIFEST_IDENTIFIERS) {
            Some(Value::Array(items)) if !items.is_empty() => items,
            Some(Value::Array(_)) | None | Some(Value::Null) => {
                return Err(ApiError::NoAssociatedArtifacts(
                    release_identifier.to_string(),
                ))
            }
            Some(other) => {
                return Err(ApiError::CorruptManifest {
                    identifier: release_identifier.to_string(),
                    reason: format!("'{}' must be an array, found {}", MANIFEST_IDENTIFIERS, other),
                })
            }
        };

        let mut records = Vec::with_capacity(identifiers.len());
        for entry in identifiers {
            let Some(identifier) = entry.as_str() else {
                warn!("Skipping non-string entry {} in manifest {}", entry, release_identifier);
                continue;
            };
            match self.resolver.latest(identifier, false)? {
                Some(record) => records.push(record),
                None => debug!(
                    "Manifest {} lists {} which has no records, skipping",
                    release_identifier, identifier
                ),
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, ReleaseManifest};

    fn expander(manifests: Vec<ReleaseManifest>) -> ReleaseManifestExpander {
        let catalog = InMemoryCatalog::from_yaml(
            r#"
forms:
  - { identifier: a.json, version: "1.0.0", content: "{}" }
  - { identifier: a.json, version: "1.1.0", content: "{}" }
  - { identifier: c.yml, version: "0.1", content: "" }
"#,
        )
        .unwrap();
        for manifest in manifests {
            catalog.add_manifest(manifest).unwrap();
        }
        let catalog = Arc::new(catalog);
        ReleaseManifestExpander::new(catalog.clone(), VersionResolver::new(catalog))
    }

    fn identifiers(records: &[ArtifactMetadataRecord]) -> Vec<&str> {
        records.iter().map(|r| r.identifier.as_str()).collect()
    }

    #[test]
    fn test_unresolvable_identifiers_are_skipped() {
        let expander = expander(vec![ReleaseManifest::new(
            "r1",
            r#"{"identifiers": ["a.json", "b.json"]}"#,
        )]);
        let records = expander.expand("r1").unwrap();
        assert_eq!(identifiers(&records), vec!["a.json"]);
        assert_eq!(records[0].version.as_str(), "1.1.0");
    }

    #[test]
    fn test_declared_order_is_kept() {
        let expander = expander(vec![ReleaseManifest::new(
            "r1",
            r#"{"identifiers": ["c.yml", 7, "a.json"]}"#,
        )]);
        let records = expander.expand("r1").unwrap();
        assert_eq!(identifiers(&records), vec!["c.yml", "a.json"]);
    }

    #[test]
    fn test_distinct_empty_outcomes() {
        let expander = expander(vec![
            ReleaseManifest::new("no-list", r#"{"forms_version": "1"}"#),
            ReleaseManifest::new("empty-list", r#"{"identifiers": []}"#),
            ReleaseManifest::new("blank", "  "),
            ReleaseManifest::new("garbled", "{identifiers"),
        ]);

        assert!(matches!(expander.expand(""), Err(ApiError::InvalidRequest(_))));
        assert!(matches!(expander.expand("nope"), Err(ApiError::ManifestNotFound(_))));
        assert!(matches!(expander.expand("blank"), Err(ApiError::ManifestNotFound(_))));
        assert!(matches!(
            expander.expand("no-list"),
            Err(ApiError::NoAssociatedArtifacts(_))
        ));
        assert!(matches!(
            expander.expand("empty-list"),
            Err(ApiError::NoAssociatedArtifacts(_))
        ));
        assert!(matches!(
            expander.expand("garbled"),
            Err(ApiError::CorruptManifest { .. })
        ));
    }
}
