//! Shared fixtures for integration tests

#![allow(dead_code)]

use opensrp_core::api::{ClientFormApi, UploadRequest};
use opensrp_core::catalog::InMemoryCatalog;
use opensrp_core::config::ServiceConfig;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Registration form released in three versions
pub const OPD_CATALOG: &str = r#"
forms:
  - { identifier: opd/reg.json, version: "0.0.1", label: Registration, content: '{"version": 1}' }
  - { identifier: opd/reg.json, version: "0.0.2", label: Registration, content: '{"version": 2}' }
  - { identifier: opd/reg.json, version: "0.0.3", label: Registration, content: '{"version": 3}' }
  - { identifier: a.json, version: "1.0.0", content: "{}" }
  - { identifier: a.json, version: "1.0.1", content: "{}" }
  - { identifier: opd/calc.yml, version: "2", content: "condition: 'true'\nactions: ['a = 1']" }
manifests:
  - identifier: "1.0.0"
    appId: org.smartregister.opd
    appVersion: "1.0.0"
    json: '{"forms_version": "1.0.0", "identifiers": ["a.json", "b.json"]}'
  - identifier: "1.1.0"
    appId: org.smartregister.opd
    appVersion: "1.1.0"
    json: '{"identifiers": ["opd/calc.yml", "opd/reg.json", "a.json"]}'
  - identifier: "0.9.0"
    json: '{"forms_version": "0.9.0"}'
"#;

pub fn catalog(seed: &str) -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::from_yaml(seed).expect("seed catalog parses"))
}

pub fn form_api(catalog: &Arc<InMemoryCatalog>) -> ClientFormApi {
    ClientFormApi::new(catalog.clone(), catalog.clone(), &ServiceConfig::default())
}

pub fn upload(file_name: &str, content_type: &str, content: &str) -> UploadRequest {
    UploadRequest {
        form_version: "1.0.0".to_string(),
        form_name: "Test form".to_string(),
        file_name: file_name.to_string(),
        content_type: content_type.to_string(),
        content: content.as_bytes().to_vec(),
        ..UploadRequest::default()
    }
}
