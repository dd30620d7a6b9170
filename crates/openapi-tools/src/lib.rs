//! Offline OpenAPI 3 import: turns an OpenAPI document into a draft API configuration for
//! `toolgate-http-tools`.

pub mod error;
pub mod import;
pub mod resolver;
pub mod source;

pub use error::{OpenApiImportError, Result};
pub use import::{ImportOptions, ImportedApi, import_openapi};
pub use source::SpecSource;
