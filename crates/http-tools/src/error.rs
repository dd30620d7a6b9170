//! Error types for `toolgate-http-tools`.
//!
//! Startup-time failures (`ConfigError`, `ValidationError`, `RegistryError`) abort initialization.
//! Invocation-time failures (`GatewayError`) are scoped to a single tool call.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// One violation reported by JSON Schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub instance_path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration validation failures. Validation is fail-fast: only the first violated rule is
/// reported.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("config schema validation failed: {}", join_violations(.violations))]
    Schema { violations: Vec<SchemaViolation> },

    #[error("config too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("API '{api}' declares {count} tools (limit {limit})")]
    TooManyTools {
        api: String,
        count: usize,
        limit: usize,
    },

    #[error("tool '{tool}' declares {count} parameters (limit {limit})")]
    TooManyParameters {
        tool: String,
        count: usize,
        limit: usize,
    },

    #[error("config declares {count} tools in total (limit {limit})")]
    TooManyToolsTotal { count: usize, limit: usize },

    #[error("API '{api}' has unsafe baseUrl '{url}': {reason}")]
    UnsafeBaseUrl {
        api: String,
        url: String,
        reason: String,
    },

    #[error("duplicate tool name '{name}'")]
    DuplicateToolName { name: String },
}

/// Failures resolving the configuration source.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API configuration source: set {inline_var} (inline JSON) or {reference_var}")]
    NoSource {
        inline_var: &'static str,
        reference_var: &'static str,
    },

    #[error("config-by-reference '{reference}' is not supported by this build")]
    ReferenceUnsupported { reference: String },

    #[error("malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("environment variable '{name}' referenced by config is not set")]
    UnresolvedPlaceholder { name: String },

    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failures building the tool registry from a validated config.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("generated tool name '{name}' collides (API '{api}', tool '{tool}')")]
    DuplicateToolName {
        name: String,
        api: String,
        tool: String,
    },

    #[error("invalid input schema for tool '{tool}': {message}")]
    InvalidInputSchema { tool: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    /// Connection, DNS, TLS or outbound-policy failure before a response was received.
    Transport,
    /// Header or body receipt exceeded the request timeout.
    Timeout,
    /// The API answered with status >= 400.
    Status,
    /// The response body exceeded the outbound size cap.
    BodyTooLarge,
}

/// Uniform failure of one outbound request.
///
/// `status_code` is `0` when no HTTP response was received. `message` never contains credentials.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    pub kind: HttpErrorKind,
    pub status_code: u16,
    pub body: Value,
    pub message: String,
}

impl HttpError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: HttpErrorKind::Transport,
            status_code: 0,
            body: Value::Null,
            message: message.into(),
        }
    }

    pub(crate) fn timeout(phase: &str, timeout_ms: u64) -> Self {
        Self {
            kind: HttpErrorKind::Timeout,
            status_code: 0,
            body: Value::Null,
            message: format!("request timed out after {timeout_ms}ms waiting for {phase}"),
        }
    }
}

/// Failure of a single tool invocation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {}", join_violations(.violations))]
    InvalidArguments {
        tool: String,
        violations: Vec<SchemaViolation>,
    },

    #[error("Tool '{tool}': {source}")]
    Mapping {
        tool: String,
        #[source]
        source: MappingError,
    },

    #[error("Tool '{tool}' failed (status {status_code}): {message}")]
    Http {
        tool: String,
        status_code: u16,
        message: String,
        #[source]
        source: HttpError,
    },
}

impl GatewayError {
    /// Upstream status code, `0` for transport failures and non-HTTP errors.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Http { status_code, .. } => *status_code,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_lists_every_violation() {
        let err = ValidationError::Schema {
            violations: vec![
                SchemaViolation {
                    instance_path: "/apis/0".into(),
                    message: "\"baseUrl\" is a required property".into(),
                },
                SchemaViolation {
                    instance_path: String::new(),
                    message: "root problem".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("/apis/0: \"baseUrl\" is a required property"));
        assert!(msg.ends_with("root problem"));
    }

    #[test]
    fn gateway_error_reports_upstream_status() {
        let err = GatewayError::Http {
            tool: "weatherGetCurrent".into(),
            status_code: 404,
            message: "city not found".into(),
            source: HttpError {
                kind: HttpErrorKind::Status,
                status_code: 404,
                body: Value::Null,
                message: "API returned 404 Not Found".into(),
            },
        };
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            err.to_string(),
            "Tool 'weatherGetCurrent' failed (status 404): city not found"
        );
        assert_eq!(GatewayError::UnknownTool("x".into()).status_code(), 0);
    }
}
