//! Client form endpoints: search, metadata listing, release files and upload

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{parse_flag, ApiResponse, JsonCodec};
use crate::catalog::{ArtifactDraft, ArtifactStore, CompleteArtifact, ManifestStore};
use crate::config::{ServiceConfig, UploadConfig};
use crate::error::{ApiError, ApiResult};
use crate::expander::ReleaseManifestExpander;
use crate::resolver::{Resolution, ResolveRequest, VersionResolver};
use crate::validator::{ContentKind, UploadContentValidator};
use crate::version::ArtifactVersion;

const NO_RELATED_FILES: &str = "This manifest does not have any files related to it";
const REQUIRED_PARAMS_EMPTY: &str = "Required params is empty";
const ADMISSION_FAILED: &str =
    "Unknown error. Kindly confirm that the form does not already exist on the server";

/// Query parameters of a form search, as received
#[derive(Debug, Clone, Copy, Default)]
pub struct FormSearchParams<'a> {
    pub form_identifier: &'a str,
    pub form_version: &'a str,
    pub strict: Option<&'a str>,
    pub current_form_version: Option<&'a str>,
    pub is_json_validator: Option<&'a str>,
}

/// A multipart form upload
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub form_version: String,
    pub form_identifier: Option<String>,
    pub form_relation: Option<String>,
    pub form_name: String,
    pub module: Option<String>,
    pub is_json_validator: Option<String>,
    /// Name of the uploaded file as sent by the client
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl UploadRequest {
    /// Explicit identifier, or the base name of the uploaded file
    pub fn effective_identifier(&self) -> String {
        match self.form_identifier.as_deref().map(str::trim) {
            Some(identifier) if !identifier.is_empty() => identifier.to_string(),
            _ => Path::new(&self.file_name)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.file_name.clone()),
        }
    }
}

/// Client form API over an artifact store and a manifest store
pub struct ClientFormApi {
    store: Arc<dyn ArtifactStore>,
    resolver: VersionResolver,
    expander: ReleaseManifestExpander,
    validator: UploadContentValidator,
    upload: UploadConfig,
    codec: JsonCodec,
}

impl ClientFormApi {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        manifests: Arc<dyn ManifestStore>,
        config: &ServiceConfig,
    ) -> Self {
        let resolver = VersionResolver::new(store.clone());
        Self {
            expander: ReleaseManifestExpander::new(manifests, resolver.clone()),
            validator: UploadContentValidator::new(store.clone()),
            resolver,
            store,
            upload: config.upload.clone(),
            codec: JsonCodec::from_config(&config.json),
        }
    }

    /// Find the form version a client should receive
    pub fn search(&self, params: &FormSearchParams<'_>) -> ApiResponse {
        self.try_search(params).unwrap_or_else(ApiResponse::from)
    }

    fn try_search(&self, params: &FormSearchParams<'_>) -> ApiResult<ApiResponse> {
        let request = ResolveRequest::new(params.form_identifier, params.form_version)
            .strict(parse_flag(params.strict))
            .current_version(params.current_form_version)
            .json_validator(parse_flag(params.is_json_validator));

        let record = match self.resolver.resolve(&request)? {
            Resolution::Resolved(record) => record,
            Resolution::NoChange => return Ok(ApiResponse::no_content()),
            Resolution::NotFound => return Ok(ApiResponse::not_found()),
        };

        let Some(content) = self.store.content_by_id(record.id)? else {
            error!("Record #{} for {} has no content", record.id, record.identifier);
            return Ok(ApiResponse::not_found());
        };

        let body = self.codec.encode(&CompleteArtifact {
            client_form: content,
            client_form_metadata: record,
        })?;
        Ok(ApiResponse::ok(body))
    }

    /// All form metadata, or only drafts / non-drafts when `is_draft` is given
    pub fn metadata(&self, is_draft: Option<&str>) -> ApiResponse {
        let result = self.store.all_records().map_err(ApiError::from).and_then(|records| {
            let records: Vec<_> = match is_draft {
                None => records,
                Some(flag) => {
                    let is_draft = parse_flag(Some(flag));
                    records.into_iter().filter(|r| r.is_draft == is_draft).collect()
                }
            };
            self.codec.encode(&records)
        });
        result.map(ApiResponse::ok).unwrap_or_else(ApiResponse::from)
    }

    /// Newest version of every file a release ships with
    pub fn release_related_files(&self, release_identifier: &str) -> ApiResponse {
        let records = match self.expander.expand(release_identifier) {
            Ok(records) => records,
            Err(err @ (ApiError::NoAssociatedArtifacts(_) | ApiError::ManifestNotFound(_))) => {
                debug!("{}", err);
                return ApiResponse::new(err.status(), Some(NO_RELATED_FILES.to_string()));
            }
            Err(err) => return err.into(),
        };

        self.codec
            .encode(&records)
            .map(ApiResponse::ok)
            .unwrap_or_else(ApiResponse::from)
    }

    /// Validate an upload and admit it into the catalog
    pub fn add(&self, upload: &UploadRequest) -> ApiResponse {
        self.try_add(upload).unwrap_or_else(ApiResponse::from)
    }

    fn try_add(&self, upload: &UploadRequest) -> ApiResult<ApiResponse> {
        if upload.form_version.trim().is_empty()
            || upload.form_name.trim().is_empty()
            || upload.content.is_empty()
        {
            return Err(ApiError::InvalidRequest(REQUIRED_PARAMS_EMPTY.to_string()));
        }

        if upload.content.len() > self.upload.max_bytes {
            return Err(ApiError::InvalidRequest(format!(
                "File exceeds the maximum upload size of {} bytes",
                self.upload.max_bytes
            )));
        }

        let kind = ContentKind::detect(&upload.content_type, &upload.file_name, &self.upload)
            .ok_or_else(|| ApiError::UnsupportedContentType(upload.content_type.clone()))?;

        let version = ArtifactVersion::parse(upload.form_version.trim())?;
        let is_json_validator = parse_flag(upload.is_json_validator.as_deref());
        let identifier = upload.effective_identifier();
        let content = String::from_utf8_lossy(&upload.content).into_owned();

        self.validator
            .validate(&content, kind, Some(&identifier), is_json_validator)?
            .into_result()?;

        let draft = ArtifactDraft {
            identifier,
            version,
            label: upload.form_name.clone(),
            module: upload.module.clone(),
            relation: upload
                .form_relation
                .clone()
                .filter(|relation| !relation.trim().is_empty()),
            is_json_validator,
            is_draft: false,
        };

        let stored = match self.store.add_artifact(draft, content) {
            Ok(stored) => stored,
            Err(err) => {
                error!("Could not store {}: {}", upload.effective_identifier(), err);
                return Ok(ApiResponse::new(500, Some(ADMISSION_FAILED.to_string())));
            }
        };
        info!(
            "Admitted {} version {} as #{}",
            stored.client_form_metadata.identifier,
            stored.client_form_metadata.version,
            stored.client_form_metadata.id
        );
        Ok(ApiResponse::created(None))
    }
}
