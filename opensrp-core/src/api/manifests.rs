//! Release manifest endpoints

use std::sync::Arc;
use tracing::{info, warn};

use super::{parse_flag, ApiResponse, JsonCodec};
use crate::catalog::{ManifestStore, ReleaseManifest};
use crate::error::ApiResult;
use crate::resolver::resolve_at_or_below;
use crate::version::ArtifactVersion;

pub struct ManifestApi {
    store: Arc<dyn ManifestStore>,
    codec: JsonCodec,
}

impl ManifestApi {
    pub fn new(store: Arc<dyn ManifestStore>, codec: JsonCodec) -> Self {
        Self { store, codec }
    }

    fn respond(result: ApiResult<ApiResponse>) -> ApiResponse {
        result.unwrap_or_else(ApiResponse::from)
    }

    pub fn list(&self) -> ApiResponse {
        Self::respond(
            self.store
                .all_manifests()
                .map_err(Into::into)
                .and_then(|manifests| self.codec.encode(&manifests))
                .map(ApiResponse::ok),
        )
    }

    pub fn get(&self, identifier: &str) -> ApiResponse {
        Self::respond(self.store.manifest(identifier).map_err(Into::into).and_then(
            |manifest| match manifest {
                Some(manifest) => self.codec.encode(&manifest).map(ApiResponse::ok),
                None => Ok(ApiResponse::not_found()),
            },
        ))
    }

    pub fn by_app_id(&self, app_id: &str) -> ApiResponse {
        Self::respond(
            self.store
                .manifests_by_app_id(app_id)
                .map_err(Into::into)
                .and_then(|manifests| self.codec.encode(&manifests))
                .map(ApiResponse::ok),
        )
    }

    pub fn create(&self, body: &str) -> ApiResponse {
        Self::respond(self.codec.decode::<ReleaseManifest>(body).and_then(|manifest| {
            info!(
                "Creating manifest {} for app version {:?}",
                manifest.identifier, manifest.app_version
            );
            self.store.add_manifest(manifest)?;
            Ok(ApiResponse::created(None))
        }))
    }

    pub fn update(&self, body: &str) -> ApiResponse {
        Self::respond(self.codec.decode::<ReleaseManifest>(body).and_then(|manifest| {
            self.store.update_manifest(manifest)?;
            Ok(ApiResponse::created(None))
        }))
    }

    pub fn delete(&self, body: &str) -> ApiResponse {
        Self::respond(self.codec.decode::<ReleaseManifest>(body).and_then(|manifest| {
            self.store.delete_manifest(&manifest.identifier)?;
            Ok(ApiResponse::accepted())
        }))
    }

    /// Add or replace every manifest in the batch; failures are reported, not fatal
    pub fn batch_save(&self, body: &str) -> ApiResponse {
        Self::respond(self.codec.decode::<Vec<ReleaseManifest>>(body).map(|manifests| {
            let failed = self.save_all(manifests);
            let message = if failed.is_empty() {
                "All manifests processed".to_string()
            } else {
                format!("Manifests with identifiers not processed: {}", failed.join(","))
            };
            ApiResponse::created(Some(message))
        }))
    }

    fn save_all(&self, manifests: Vec<ReleaseManifest>) -> Vec<String> {
        let mut failed = Vec::new();
        for manifest in manifests {
            let identifier = manifest.identifier.clone();
            let saved = match self.store.manifest(&identifier) {
                Ok(Some(_)) => self.store.update_manifest(manifest),
                Ok(None) => self.store.add_manifest(manifest),
                Err(e) => Err(e),
            };
            if let Err(e) = saved {
                warn!("Manifest {} not saved: {}", identifier, e);
                failed.push(identifier);
            }
        }
        failed
    }

    /// Manifest for an application version
    ///
    /// Strict search wants that exact version. Otherwise the exact version or
    /// the newest one below it is returned.
    pub fn search(&self, app_id: &str, app_version: &str, strict: Option<&str>) -> ApiResponse {
        Self::respond(self.try_search(app_id, app_version, parse_flag(strict)))
    }

    fn try_search(&self, app_id: &str, app_version: &str, strict: bool) -> ApiResult<ApiResponse> {
        let manifest = if strict {
            self.store.manifest_by_app_id_and_version(app_id, app_version)?
        } else {
            let requested = ArtifactVersion::parse(app_version)?;
            let candidates = self
                .store
                .manifests_by_app_id(app_id)?
                .into_iter()
                .filter_map(|manifest| {
                    let raw = manifest.app_version.as_deref()?;
                    match ArtifactVersion::parse(raw) {
                        Ok(version) => Some((version, manifest)),
                        Err(e) => {
                            warn!("Ignoring manifest {}: {}", manifest.identifier, e);
                            None
                        }
                    }
                });
            resolve_at_or_below(candidates, &requested)
        };

        match manifest {
            Some(manifest) => Ok(ApiResponse::ok(self.codec.encode(&manifest)?)),
            None => Ok(ApiResponse::not_found()),
        }
    }
}
