//! Framework-neutral response value handed back to whatever serves HTTP

use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::error::ApiError;

/// Header carrying the total number of matching records on paged sync calls
pub const TOTAL_RECORDS: &str = "total_records";

/// Status, optional body and extra headers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Option<String>) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn ok(body: String) -> Self {
        Self::new(200, Some(body))
    }

    pub fn created(body: Option<String>) -> Self {
        Self::new(201, body)
    }

    pub fn accepted() -> Self {
        Self::new(202, None)
    }

    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    pub fn not_found() -> Self {
        Self::new(404, None)
    }

    pub fn with_header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_str(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        if err.is_server_error() {
            error!("Request failed: {}", err);
        } else if err.is_client_error() {
            warn!("Request rejected: {}", err);
        }
        ApiResponse::new(err.status(), Some(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_error_conversion() {
        let response = ApiResponse::from(ApiError::InvalidRequest("Plan Identifier is missing".into()));
        assert_eq!(response.status, 400);
        assert_eq!(response.body_str(), "Plan Identifier is missing");

        let response = ApiResponse::from(ApiError::Store(StoreError::Unavailable("db down".into())));
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
    }

    #[test]
    fn test_headers() {
        let response = ApiResponse::ok("[]".into()).with_header(TOTAL_RECORDS, 12);
        assert_eq!(response.headers[TOTAL_RECORDS], "12");
        assert!(response.is_success());
    }
}
