//! Cross-reference rules for JSON form uploads
//!
//! Each rule finds one kind of reference by its key in the raw form text and
//! lists the catalog identifiers that would satisfy it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

use crate::catalog::{ArtifactStore, StoreResult};

static SUB_FORM_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""content_form"\s*:\s*"([^"]+)""#).expect("valid reference pattern"));

static RULE_FILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""rules-file"\s*:\s*"([^"]+)""#).expect("valid reference pattern"));

static PROPERTY_FILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""properties_file_name"\s*:\s*"([^"]+)""#).expect("valid reference pattern")
});

/// The three kinds of artifact a form can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    SubForm,
    RuleFile,
    PropertyFile,
}

/// A kind of reference a form can carry
pub trait ReferenceRule: Send + Sync {
    fn kind(&self) -> ReferenceKind;

    /// Pattern whose first group captures the referenced name
    fn pattern(&self) -> &Regex;

    /// Catalog identifiers, in lookup order, any of which satisfies the reference
    fn candidates(&self, name: &str) -> Vec<String>;

    /// Distinct referenced names in the content
    fn references(&self, content: &str) -> BTreeSet<String> {
        self.pattern()
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Referenced names with no matching artifact in the store
    fn find_missing(
        &self,
        content: &str,
        store: &dyn ArtifactStore,
    ) -> StoreResult<BTreeSet<String>> {
        let mut missing = BTreeSet::new();
        for name in self.references(content) {
            let mut found = false;
            for candidate in self.candidates(&name) {
                if store.exists(&candidate, false)? {
                    found = true;
                    break;
                }
            }
            if !found {
                debug!("{:?} reference {} is not in the catalog", self.kind(), name);
                missing.insert(name);
            }
        }
        Ok(missing)
    }
}

/// `"content_form": "<name>"`, satisfied by `<name>` or `<name>.json`
pub struct SubFormReference;

impl ReferenceRule for SubFormReference {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::SubForm
    }

    fn pattern(&self) -> &Regex {
        &SUB_FORM_PATTERN
    }

    fn candidates(&self, name: &str) -> Vec<String> {
        vec![name.to_string(), format!("{}.json", name)]
    }
}

/// `"rules-file": "<name>"`, satisfied by `<name>` only
pub struct RuleFileReference;

impl ReferenceRule for RuleFileReference {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::RuleFile
    }

    fn pattern(&self) -> &Regex {
        &RULE_FILE_PATTERN
    }

    fn candidates(&self, name: &str) -> Vec<String> {
        vec![name.to_string()]
    }
}

/// `"properties_file_name": "<name>"`, satisfied by `<name>` or `<name>.properties`
pub struct PropertyFileReference;

impl ReferenceRule for PropertyFileReference {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::PropertyFile
    }

    fn pattern(&self) -> &Regex {
        &PROPERTY_FILE_PATTERN
    }

    fn candidates(&self, name: &str) -> Vec<String> {
        vec![name.to_string(), format!("{}.properties", name)]
    }
}

/// All reference rules applied to JSON uploads
pub fn default_rules() -> Vec<Box<dyn ReferenceRule>> {
    vec![
        Box::new(SubFormReference),
        Box::new(RuleFileReference),
        Box::new(PropertyFileReference),
    ]
}
