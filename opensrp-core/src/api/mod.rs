//! Request boundary
//!
//! Each API value takes already-extracted request parameters and returns an
//! [`ApiResponse`]; wiring these to an HTTP server is left to the host.

pub mod codec;
pub mod forms;
pub mod manifests;
pub mod plans;
pub mod response;
pub mod tasks;

pub use codec::JsonCodec;
pub use forms::{ClientFormApi, FormSearchParams, UploadRequest};
pub use manifests::ManifestApi;
pub use plans::{PlanApi, PlanStore};
pub use response::ApiResponse;
pub use tasks::{
    DateWindow, LegacyTaskSyncParams, TaskApi, TaskService, TaskSyncQuery, TaskSyncRequest,
    TaskUpdate,
};

/// Boolean query flag: `true` in any letter case, everything else (or nothing) is false
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
