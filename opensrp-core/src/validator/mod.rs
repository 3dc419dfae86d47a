//! Upload content validation
//!
//! Runs before an artifact is admitted into the catalog:
//!
//! 1. structure - the content must parse as its declared kind
//! 2. cross references - sub-forms, rule files and property files a JSON form
//!    points at must already be in the catalog
//! 3. required fields - fields locked by the newest validator artifact for the
//!    identifier must still be present
//!
//! Steps 2 and 3 only apply to JSON forms that are not validator artifacts
//! themselves. Validation never writes to the catalog.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

pub mod fields;
pub mod properties;
pub mod references;
pub mod rules;
mod structure;

#[cfg(test)]
mod tests;

use crate::catalog::ArtifactStore;
use crate::config::UploadConfig;
use crate::error::{ApiError, ApiResult};
use fields::WidgetValidatorDefinition;
use references::{ReferenceKind, ReferenceRule};

/// Declared format of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Yaml,
    Properties,
}

impl ContentKind {
    /// Classify an upload by content type, and by file name for properties bundles
    pub fn detect(content_type: &str, file_name: &str, config: &UploadConfig) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let listed = |types: &[String]| types.iter().any(|t| t.eq_ignore_ascii_case(&media_type));

        if listed(&config.json_content_types) {
            Some(ContentKind::Json)
        } else if listed(&config.yaml_content_types) {
            Some(ContentKind::Yaml)
        } else if listed(&config.properties_content_types)
            && file_name.ends_with(&config.properties_extension)
        {
            Some(ContentKind::Properties)
        } else {
            None
        }
    }
}

/// Everything an upload is missing; empty means it can be admitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub missing_sub_forms: BTreeSet<String>,
    pub missing_rule_files: BTreeSet<String>,
    pub missing_property_files: BTreeSet<String>,
    pub missing_required_fields: BTreeSet<String>,
}

impl ValidationOutcome {
    pub fn has_missing_references(&self) -> bool {
        !(self.missing_sub_forms.is_empty()
            && self.missing_rule_files.is_empty()
            && self.missing_property_files.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_missing_references() && self.missing_required_fields.is_empty()
    }

    /// Message returned to the uploader, or `None` when nothing is missing
    ///
    /// Missing references are reported first; locked fields are only reported
    /// once every reference resolves.
    pub fn rejection_message(&self) -> Option<String> {
        if self.has_missing_references() {
            let mut message = String::from("Form upload failed.");
            let sections = [
                ("sub-form(s)", &self.missing_sub_forms),
                ("rules file(s)", &self.missing_rule_files),
                ("property file(s)", &self.missing_property_files),
            ];
            for (label, missing) in sections {
                if !missing.is_empty() {
                    message.push_str(&format!(
                        "Kindly make sure that the following {} are uploaded before: {}",
                        label,
                        join(missing)
                    ));
                }
            }
            return Some(message);
        }

        if !self.missing_required_fields.is_empty() {
            return Some(format!(
                "Kindly make sure that the following fields are still in the form : {}. \
                 The fields cannot be removed as per the Administrator policy",
                join(&self.missing_required_fields)
            ));
        }

        None
    }

    /// `Ok` when nothing is missing, otherwise the rejection
    pub fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::MissingReferences(self))
        }
    }

    fn missing_mut(&mut self, kind: ReferenceKind) -> &mut BTreeSet<String> {
        match kind {
            ReferenceKind::SubForm => &mut self.missing_sub_forms,
            ReferenceKind::RuleFile => &mut self.missing_rule_files,
            ReferenceKind::PropertyFile => &mut self.missing_property_files,
        }
    }
}

fn join(items: &BTreeSet<String>) -> String {
    items.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Checks uploads against their declared kind and the current catalog
pub struct UploadContentValidator {
    store: Arc<dyn ArtifactStore>,
    rules: Vec<Box<dyn ReferenceRule>>,
}

impl UploadContentValidator {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            rules: references::default_rules(),
        }
    }

    /// Validate one upload
    ///
    /// A structural problem is returned as [`ApiError::StructuralError`]; missing
    /// references and fields are collected into the outcome.
    pub fn validate(
        &self,
        content: &str,
        kind: ContentKind,
        identifier: Option<&str>,
        is_json_validator: bool,
    ) -> ApiResult<ValidationOutcome> {
        let parsed = structure::check_structure(content, kind).map_err(ApiError::StructuralError)?;

        let mut outcome = ValidationOutcome::default();
        let Some(form) = parsed.filter(|_| !is_json_validator) else {
            return Ok(outcome);
        };

        for rule in &self.rules {
            let missing = rule.find_missing(content, self.store.as_ref())?;
            outcome.missing_mut(rule.kind()).extend(missing);
        }

        if let Some(identifier) = identifier.map(str::trim).filter(|i| !i.is_empty()) {
            if let Some(validator) = self.store.most_recent_validator(identifier)? {
                let definition = WidgetValidatorDefinition::from_json(&validator.json).map_err(|e| {
                    ApiError::CorruptValidator {
                        identifier: identifier.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                outcome.missing_required_fields = definition.missing_fields(&form);
            } else {
                debug!("No validator artifact for {}", identifier);
            }
        }

        if !outcome.is_empty() {
            info!("Upload {:?} rejected: {:?}", identifier, outcome);
        }
        Ok(outcome)
    }
}
