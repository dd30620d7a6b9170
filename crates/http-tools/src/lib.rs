//! Declarative REST APIs exposed as callable tools.
//!
//! Flow: [`loader::ConfigLoader`] resolves and substitutes the config, [`validate`] checks it,
//! [`runtime::ToolRegistry`] registers the tools and drives each call through
//! [`mapping`] -> [`client`] -> [`response_shaping`].
//!
//! The crate has no transport framing of its own; callers use
//! [`runtime::ToolRegistry::list_tools`] and [`runtime::ToolRegistry::invoke`].

pub mod client;
pub mod config;
pub mod error;
pub mod loader;
pub mod mapping;
pub mod response_shaping;
pub mod runtime;
pub mod safety;
pub mod semantics;
pub mod validate;

pub use config::ApiConfig;
pub use error::{ConfigError, GatewayError, HttpError, RegistryError, ValidationError};
pub use loader::ConfigLoader;
pub use runtime::{RegistryOptions, ToolRegistry, derive_tool_name};
pub use safety::OutboundHttpSafety;
pub use validate::validate;
