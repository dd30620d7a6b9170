//! Error types for `toolgate-openapi-tools`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenApiImportError {
    #[error("invalid OpenAPI spec location '{location}': {message}")]
    InvalidLocation { location: String, message: String },

    #[error("OpenAPI spec fetch blocked: {0}")]
    FetchBlocked(String),

    #[error("failed to fetch spec from '{url}': {message}")]
    SpecFetch { url: String, message: String },

    #[error("failed to read spec file '{path}': {source}")]
    SpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI spec from '{location}': {source}")]
    SpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("spec hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("unsupported $ref '{0}' (only local '#/...' references are resolved)")]
    UnsupportedRef(String),

    #[error("unresolved $ref '{0}'")]
    UnresolvedRef(String),

    #[error("cyclic $ref detected while resolving '{0}'")]
    CyclicRef(String),

    #[error("referenced value '{reference}' has an unexpected shape: {source}")]
    RefShape {
        reference: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OpenApiImportError>;
