//! Tests for upload content validation

use super::*;
use crate::catalog::InMemoryCatalog;
use crate::config::UploadConfig;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        ArtifactContent, ArtifactDraft, ArtifactMetadataRecord, CompleteArtifact, StoreResult,
    };
    use crate::version::ArtifactVersion;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const PHYSICAL_EXAM_FORM: &str = r#"{
  "count": "1",
  "encounter_type": "Physical Exam",
  "step1": {
    "title": "Physical Exam",
    "fields": [
      {"key": "height", "type": "edit_text"},
      {"key": "abdominal_exam", "type": "expansion_panel", "content_form": "abdominal_exam_sub_form"},
      {"key": "breast_exam", "type": "expansion_panel", "content_form": "breast_exam_sub_form"},
      {"key": "breast_exam_again", "type": "expansion_panel", "content_form": "breast_exam_sub_form"},
      {
        "key": "bmi",
        "relevance": {"rules-engine": {"ex-rules": {"rules-file": "physical-exam-relevance-rules.yml"}}},
        "calculation": {"rules-engine": {"ex-rules": {"rules-file": "physical-exam-calculations-rules.yml"}}}
      },
      {"key": "register_title", "properties_file_name": "anc_register"}
    ]
  }
}"#;

    /// Wraps a catalog and records every existence lookup
    struct CountingStore {
        inner: InMemoryCatalog,
        lookups: Mutex<Vec<String>>,
    }

    impl CountingStore {
        fn new(seed: &str) -> Self {
            Self {
                inner: InMemoryCatalog::from_yaml(seed).unwrap(),
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().unwrap().clone()
        }
    }

    impl ArtifactStore for CountingStore {
        fn exists(&self, identifier: &str, is_json_validator: bool) -> StoreResult<bool> {
            self.lookups.lock().unwrap().push(identifier.to_string());
            self.inner.exists(identifier, is_json_validator)
        }

        fn records_by_identifier(
            &self,
            identifier: &str,
            is_json_validator: bool,
        ) -> StoreResult<Vec<ArtifactMetadataRecord>> {
            self.inner.records_by_identifier(identifier, is_json_validator)
        }

        fn record_by_identifier_and_version(
            &self,
            identifier: &str,
            version: &ArtifactVersion,
            is_json_validator: bool,
        ) -> StoreResult<Option<ArtifactMetadataRecord>> {
            self.inner
                .record_by_identifier_and_version(identifier, version, is_json_validator)
        }

        fn record_by_id(&self, id: u64) -> StoreResult<Option<ArtifactMetadataRecord>> {
            self.inner.record_by_id(id)
        }

        fn content_by_id(&self, id: u64) -> StoreResult<Option<ArtifactContent>> {
            self.inner.content_by_id(id)
        }

        fn most_recent_validator(&self, identifier: &str) -> StoreResult<Option<ArtifactContent>> {
            self.inner.most_recent_validator(identifier)
        }

        fn all_records(&self) -> StoreResult<Vec<ArtifactMetadataRecord>> {
            self.inner.all_records()
        }

        fn add_artifact(
            &self,
            draft: ArtifactDraft,
            content: String,
        ) -> StoreResult<CompleteArtifact> {
            self.inner.add_artifact(draft, content)
        }
    }

    fn validator_over(store: Arc<CountingStore>) -> UploadContentValidator {
        UploadContentValidator::new(store)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_form_without_references_is_clean() {
        let store = Arc::new(CountingStore::new(""));
        let outcome = validator_over(store.clone())
            .validate(r#"{"step1": {"fields": [{"key": "a"}]}}"#, ContentKind::Json, None, false)
            .unwrap();
        assert!(outcome.is_empty());
        assert!(store.lookups().is_empty());
    }

    #[test]
    fn test_missing_references_are_collected_by_kind() {
        let store = Arc::new(CountingStore::new(
            r#"
forms:
  - { identifier: abdominal_exam_sub_form, version: "1", content: "{}" }
  - { identifier: physical-exam-relevance-rules.yml, version: "1", content: "" }
"#,
        ));
        let outcome = validator_over(store.clone())
            .validate(PHYSICAL_EXAM_FORM, ContentKind::Json, None, false)
            .unwrap();

        assert_eq!(outcome.missing_sub_forms, set(&["breast_exam_sub_form"]));
        assert_eq!(
            outcome.missing_rule_files,
            set(&["physical-exam-calculations-rules.yml"])
        );
        assert_eq!(outcome.missing_property_files, set(&["anc_register"]));
        assert!(outcome.missing_required_fields.is_empty());

        // each distinct reference is looked up once per candidate name
        assert_eq!(
            store.lookups(),
            vec![
                "abdominal_exam_sub_form",
                "breast_exam_sub_form",
                "breast_exam_sub_form.json",
                "physical-exam-calculations-rules.yml",
                "physical-exam-relevance-rules.yml",
                "anc_register",
                "anc_register.properties",
            ]
        );
    }

    #[test]
    fn test_references_resolve_through_extensions() {
        let store = Arc::new(CountingStore::new(
            r#"
forms:
  - { identifier: abdominal_exam_sub_form.json, version: "1", content: "{}" }
  - { identifier: breast_exam_sub_form, version: "1", content: "{}" }
  - { identifier: physical-exam-relevance-rules.yml, version: "1", content: "" }
  - { identifier: physical-exam-calculations-rules.yml, version: "1", content: "" }
  - { identifier: anc_register.properties, version: "1", content: "" }
"#,
        ));
        let outcome = validator_over(store)
            .validate(PHYSICAL_EXAM_FORM, ContentKind::Json, None, false)
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::default());
    }

    #[test]
    fn test_validator_uploads_skip_catalog_checks() {
        let store = Arc::new(CountingStore::new(
            r#"
forms:
  - identifier: physical_exam.json
    version: "1"
    isJsonValidator: true
    content: '{"cannot_remove": {"fields": ["height", "weight"]}}'
"#,
        ));
        let outcome = validator_over(store.clone())
            .validate(
                PHYSICAL_EXAM_FORM,
                ContentKind::Json,
                Some("physical_exam.json"),
                true,
            )
            .unwrap();
        assert!(outcome.is_empty());
        assert!(store.lookups().is_empty());
    }

    #[test]
    fn test_required_fields_use_newest_validator() {
        let store = Arc::new(CountingStore::new(
            r#"
forms:
  - identifier: reg.json
    version: "1"
    isJsonValidator: true
    createdAt: 2024-01-01T00:00:00Z
    content: '{"cannot_remove": {"fields": ["first_name", "dob"]}}'
  - identifier: reg.json
    version: "2"
    isJsonValidator: true
    createdAt: 2024-06-01T00:00:00Z
    content: '{"cannot_remove": {"title": "Locked", "fields": ["first_name", "nickname"]}}'
"#,
        ));
        let form = r#"{"step1": {"fields": [{"key": "first_name"}, {"key": "dob"}]}}"#;
        let outcome = validator_over(store)
            .validate(form, ContentKind::Json, Some("reg.json"), false)
            .unwrap();

        assert_eq!(outcome.missing_required_fields, set(&["nickname"]));
        assert_eq!(
            outcome.rejection_message().unwrap(),
            "Kindly make sure that the following fields are still in the form : nickname. \
             The fields cannot be removed as per the Administrator policy"
        );
    }

    #[test]
    fn test_unreadable_validator_is_a_server_error() {
        let store = Arc::new(CountingStore::new(
            r#"
forms:
  - { identifier: reg.json, version: "1", isJsonValidator: true, content: "not json" }
"#,
        ));
        let err = validator_over(store)
            .validate("{}", ContentKind::Json, Some("reg.json"), false)
            .unwrap_err();
        assert!(matches!(err, ApiError::CorruptValidator { .. }));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_structural_errors() {
        let validator = validator_over(Arc::new(CountingStore::new("")));

        let err = validator
            .validate("{\"a\": ", ContentKind::Json, None, false)
            .unwrap_err();
        assert!(err.to_string().starts_with("File content error:\n"));

        let err = validator.validate("[1, 2]", ContentKind::Json, None, false).unwrap_err();
        assert!(err.to_string().contains("found an array"));

        assert!(matches!(
            validator.validate("name: r\nactions: ['a = 1']", ContentKind::Yaml, None, false),
            Err(ApiError::StructuralError(_))
        ));
        assert!(matches!(
            validator.validate("key=\\uZZZZ", ContentKind::Properties, None, false),
            Err(ApiError::StructuralError(_))
        ));
    }

    #[test]
    fn test_yaml_and_properties_have_no_reference_checks() {
        let store = Arc::new(CountingStore::new(""));
        let validator = validator_over(store.clone());

        let yaml = "name: r\ncondition: \"'\\\"content_form\\\": \\\"x\\\"' != null\"\nactions: ['a = 1']";
        assert!(validator.validate(yaml, ContentKind::Yaml, None, false).unwrap().is_empty());
        assert!(validator
            .validate("title=Register", ContentKind::Properties, Some("anc.properties"), false)
            .unwrap()
            .is_empty());
        assert!(store.lookups().is_empty());
    }

    #[test]
    fn test_rejection_message_lists_every_missing_kind() {
        let outcome = ValidationOutcome {
            missing_sub_forms: set(&["a", "b"]),
            missing_property_files: set(&["c"]),
            missing_required_fields: set(&["ignored_until_references_resolve"]),
            ..ValidationOutcome::default()
        };
        assert_eq!(
            outcome.rejection_message().unwrap(),
            "Form upload failed.\
             Kindly make sure that the following sub-form(s) are uploaded before: a, b\
             Kindly make sure that the following property file(s) are uploaded before: c"
        );
        assert!(ValidationOutcome::default().rejection_message().is_none());
        assert!(ValidationOutcome::default().into_result().is_ok());
    }

    #[test]
    fn test_content_kind_detection() {
        let config = UploadConfig::default();
        assert_eq!(
            ContentKind::detect("application/json; charset=UTF-8", "reg.json", &config),
            Some(ContentKind::Json)
        );
        assert_eq!(
            ContentKind::detect("text/yaml", "rules.yml", &config),
            Some(ContentKind::Yaml)
        );
        assert_eq!(
            ContentKind::detect("application/octet-stream", "anc.properties", &config),
            Some(ContentKind::Properties)
        );
        assert_eq!(
            ContentKind::detect("application/octet-stream", "anc.bin", &config),
            None
        );
        assert_eq!(ContentKind::detect("text/plain", "notes.txt", &config), None);
    }
}
