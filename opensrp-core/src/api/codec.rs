//! JSON encoding for response bodies

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::JsonConfig;
use crate::error::{ApiError, ApiResult};

/// Serialization settings passed to each API value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec {
    pub pretty: bool,
}

impl JsonCodec {
    pub fn from_config(config: &JsonConfig) -> Self {
        Self {
            pretty: config.pretty,
        }
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> ApiResult<String> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(encoded)
    }

    /// Decode a request body; malformed input is the caller's fault
    pub fn decode<T: DeserializeOwned>(&self, body: &str) -> ApiResult<T> {
        serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Malformed request body: {}", e)))
    }
}
