//! Version reconciliation between what a client asks for and what the catalog holds
//!
//! Resolution order:
//!
//! 1. versions must parse, and the client must not claim to be ahead of its request
//! 2. no record for the identifier at all: not found
//! 3. an exact `(identifier, version)` record wins in either mode
//! 4. otherwise the newest record is the fallback; best-effort mode returns it,
//!    strict mode only reports "no change" when the client already holds it
//!
//! Among several records with the same maximal version the one with the highest
//! id (the most recent upload) is the fallback.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::catalog::{ArtifactMetadataRecord, ArtifactStore};
use crate::error::{ApiError, ApiResult};
use crate::version::ArtifactVersion;

/// Parameters of one resolve call
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub identifier: &'a str,
    pub requested_version: &'a str,
    pub strict: bool,
    pub current_version: Option<&'a str>,
    pub is_json_validator: bool,
}

impl<'a> ResolveRequest<'a> {
    /// Best-effort request for a regular artifact
    pub fn new(identifier: &'a str, requested_version: &'a str) -> Self {
        Self {
            identifier,
            requested_version,
            strict: false,
            current_version: None,
            is_json_validator: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Version the client already holds
    pub fn current_version(mut self, current: Option<&'a str>) -> Self {
        self.current_version = current.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn json_validator(mut self, is_json_validator: bool) -> Self {
        self.is_json_validator = is_json_validator;
        self
    }
}

/// What the client should receive
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Send this record
    Resolved(ArtifactMetadataRecord),
    /// The client already holds the newest version
    NoChange,
    /// Nothing suitable exists
    NotFound,
}

impl Resolution {
    pub fn record(&self) -> Option<&ArtifactMetadataRecord> {
        match self {
            Resolution::Resolved(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<ArtifactMetadataRecord> {
        match self {
            Resolution::Resolved(record) => Some(record),
            _ => None,
        }
    }
}

/// Resolves client version requests against an [`ArtifactStore`]
///
/// Holds no state of its own; every call reads the records it needs.
#[derive(Clone)]
pub struct VersionResolver {
    store: Arc<dyn ArtifactStore>,
}

impl VersionResolver {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Decide which record, if any, answers the request
    pub fn resolve(&self, request: &ResolveRequest<'_>) -> ApiResult<Resolution> {
        if request.identifier.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "Artifact identifier cannot be empty".to_string(),
            ));
        }

        let requested = ArtifactVersion::parse(request.requested_version)?;
        let current = request
            .current_version
            .map(ArtifactVersion::parse)
            .transpose()?;

        if let Some(current) = &current {
            if current > &requested {
                return Err(ApiError::InvalidRequest(format!(
                    "Current version {} is greater than the requested version {}",
                    current, requested
                )));
            }
        }

        let (identifier, is_validator) = (request.identifier, request.is_json_validator);
        if !self.store.exists(identifier, is_validator)? {
            debug!("No records for {}", identifier);
            return Ok(Resolution::NotFound);
        }

        if let Some(record) =
            self.store
                .record_by_identifier_and_version(identifier, &requested, is_validator)?
        {
            trace!("Exact match for {} {}", identifier, requested);
            return Ok(Resolution::Resolved(record));
        }

        let Some(fallback) = self.latest(identifier, is_validator)? else {
            return Ok(Resolution::NotFound);
        };

        if !request.strict {
            debug!(
                "{} {} not found, falling back to {}",
                identifier, requested, fallback.version
            );
            return Ok(Resolution::Resolved(fallback));
        }

        match current {
            Some(current) if current == fallback.version => {
                debug!("{} client already holds {}", identifier, current);
                Ok(Resolution::NoChange)
            }
            _ => Ok(Resolution::NotFound),
        }
    }

    /// Newest record for an identifier, highest id first among equal versions
    pub fn latest(
        &self,
        identifier: &str,
        is_json_validator: bool,
    ) -> ApiResult<Option<ArtifactMetadataRecord>> {
        let records = self
            .store
            .records_by_identifier(identifier, is_json_validator)?;
        Ok(newest(records))
    }
}

fn newest(records: Vec<ArtifactMetadataRecord>) -> Option<ArtifactMetadataRecord> {
    records
        .into_iter()
        .max_by(|a, b| a.version.cmp(&b.version).then(a.id.cmp(&b.id)))
}

/// Exact match for `requested` if present, else the highest version strictly below it
///
/// When several candidates share the winning version the last one is returned.
pub fn resolve_at_or_below<T>(
    candidates: impl IntoIterator<Item = (ArtifactVersion, T)>,
    requested: &ArtifactVersion,
) -> Option<T> {
    candidates
        .into_iter()
        .filter(|(version, _)| version <= requested)
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, item)| item)
}
