//! OpenSRP artifact sync core
//!
//! Decides which version of a form, rules file or properties bundle a client
//! receives, expands release manifests into their artifacts, and validates
//! uploads before they enter the catalog.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod expander;
pub mod resolver;
pub mod validator;
pub mod version;

pub use error::{ApiError, ApiResult, StoreError};
pub use expander::ReleaseManifestExpander;
pub use resolver::{Resolution, ResolveRequest, VersionResolver};
pub use validator::{ContentKind, UploadContentValidator, ValidationOutcome};
pub use version::{ArtifactVersion, VersionError};
