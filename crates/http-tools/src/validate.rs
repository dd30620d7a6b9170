//! Startup validation of an API configuration.
//!
//! Checks run in a fixed order and the first failure aborts validation:
//! 1. JSON Schema (structure)
//! 2. serialized size
//! 3. tool / parameter counts
//! 4. base URL safety (SSRF guard)
//! 5. tool name uniqueness

use crate::config::ApiConfig;
use crate::error::{SchemaViolation, ValidationError};
use crate::safety::OutboundHttpSafety;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::LazyLock;

pub const MAX_CONFIG_BYTES: usize = 30 * 1024;
pub const MAX_APIS: usize = 20;
pub const MAX_TOOLS_PER_API: usize = 20;
pub const MAX_PARAMS_PER_TOOL: usize = 20;
pub const MAX_TOOLS_TOTAL: usize = 20;

static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(config_schema);

fn config_schema() -> Value {
    let string_map = json!({
        "type": "object",
        "additionalProperties": { "type": "string" }
    });
    let auth = json!({
        "oneOf": [
            {
                "type": "object",
                "properties": { "type": { "const": "bearer" }, "token": { "type": "string" } },
                "required": ["type", "token"],
                "additionalProperties": false
            },
            {
                "type": "object",
                "properties": {
                    "type": { "enum": ["header", "query_param"] },
                    "name": { "type": "string", "minLength": 1 },
                    "value": { "type": "string" }
                },
                "required": ["type", "name", "value"],
                "additionalProperties": false
            },
            {
                "type": "object",
                "properties": {
                    "type": { "const": "basic" },
                    "username": { "type": "string" },
                    "password": { "type": "string" }
                },
                "required": ["type", "username", "password"],
                "additionalProperties": false
            },
            {
                "type": "object",
                "properties": { "type": { "const": "none" } },
                "required": ["type"],
                "additionalProperties": false
            }
        ]
    });
    let parameter = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "description": { "type": "string" },
            "type": { "enum": ["string", "number", "boolean", "object", "array"] },
            "required": { "type": "boolean" },
            "default": {},
            "location": { "enum": ["path", "query", "body", "header"] },
            "mapping": { "type": "string", "minLength": 1 },
            "enum": { "type": "array" },
            "pattern": { "type": "string", "format": "regex" }
        },
        "required": ["name", "type"],
        "additionalProperties": false
    });
    let transform = json!({
        "type": "object",
        "properties": {
            "type": { "enum": ["json", "text", "raw"] },
            "jsonPath": { "type": "string" },
            "template": { "type": "string" },
            "errorPath": { "type": "string" },
            "truncate": { "type": "integer", "minimum": 1 }
        },
        "required": ["type"],
        "additionalProperties": false
    });
    let tool = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "description": { "type": "string" },
            "endpoint": { "type": "string" },
            "method": {
                "type": "string",
                "pattern": "^(?i:get|post|put|patch|delete|head|options)$"
            },
            "parameters": { "type": "array", "items": parameter },
            "transform": transform,
            "headers": string_map,
            "timeout": { "type": "integer", "minimum": 1 }
        },
        "required": ["name", "description", "endpoint", "method"],
        "additionalProperties": false
    });
    json!({
        "type": "object",
        "properties": {
            "apis": {
                "type": "array",
                "minItems": 1,
                "maxItems": MAX_APIS,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "description": { "type": "string" },
                        "baseUrl": { "type": "string", "minLength": 1 },
                        "auth": auth,
                        "tools": { "type": "array", "minItems": 1, "items": tool },
                        "headers": string_map,
                        "timeout": { "type": "integer", "minimum": 1 }
                    },
                    "required": ["name", "description", "baseUrl", "auth", "tools"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["apis"],
        "additionalProperties": false
    })
}

/// Validate a raw configuration value with the default (strict) outbound policy.
///
/// # Errors
///
/// Returns the first violated rule as a [`ValidationError`].
pub fn validate(raw: &Value) -> Result<ApiConfig, ValidationError> {
    validate_with_safety(raw, &OutboundHttpSafety::strict())
}

/// Validate a raw configuration value against an explicit outbound policy.
///
/// # Errors
///
/// Returns the first violated rule as a [`ValidationError`].
pub fn validate_with_safety(
    raw: &Value,
    safety: &OutboundHttpSafety,
) -> Result<ApiConfig, ValidationError> {
    check_schema(raw)?;
    let config: ApiConfig =
        serde_json::from_value(raw.clone()).map_err(|e| ValidationError::Schema {
            violations: vec![SchemaViolation {
                instance_path: String::new(),
                message: e.to_string(),
            }],
        })?;

    check_size(&config)?;
    check_counts(&config)?;
    check_urls(&config, safety)?;
    check_unique_names(&config)?;
    Ok(config)
}

fn check_schema(raw: &Value) -> Result<(), ValidationError> {
    let validator = jsonschema::validator_for(&CONFIG_SCHEMA).map_err(|e| {
        ValidationError::Schema {
            violations: vec![SchemaViolation {
                instance_path: String::new(),
                message: format!("internal config schema is invalid: {e}"),
            }],
        }
    })?;

    let violations: Vec<SchemaViolation> = validator
        .iter_errors(raw)
        .map(|e| SchemaViolation {
            instance_path: e.instance_path().to_string(),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Schema { violations })
    }
}

/// Size is measured on the canonical serialization so that re-validating a config's own output
/// sees the same number.
fn check_size(config: &ApiConfig) -> Result<(), ValidationError> {
    let size = serde_json::to_string(config).map_or(usize::MAX, |s| s.len());
    if size > MAX_CONFIG_BYTES {
        return Err(ValidationError::TooLarge {
            size,
            limit: MAX_CONFIG_BYTES,
        });
    }
    Ok(())
}

fn check_counts(config: &ApiConfig) -> Result<(), ValidationError> {
    for api in &config.apis {
        if api.tools.len() > MAX_TOOLS_PER_API {
            return Err(ValidationError::TooManyTools {
                api: api.name.clone(),
                count: api.tools.len(),
                limit: MAX_TOOLS_PER_API,
            });
        }
        for tool in &api.tools {
            if tool.parameters.len() > MAX_PARAMS_PER_TOOL {
                return Err(ValidationError::TooManyParameters {
                    tool: tool.name.clone(),
                    count: tool.parameters.len(),
                    limit: MAX_PARAMS_PER_TOOL,
                });
            }
        }
    }

    let total = config.tool_count();
    if total > MAX_TOOLS_TOTAL {
        return Err(ValidationError::TooManyToolsTotal {
            count: total,
            limit: MAX_TOOLS_TOTAL,
        });
    }
    Ok(())
}

fn check_urls(config: &ApiConfig, safety: &OutboundHttpSafety) -> Result<(), ValidationError> {
    for api in &config.apis {
        safety
            .check_base_url(&api.base_url)
            .map_err(|reason| ValidationError::UnsafeBaseUrl {
                api: api.name.clone(),
                url: api.base_url.clone(),
                reason,
            })?;
    }
    Ok(())
}

fn check_unique_names(config: &ApiConfig) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for tool in config.apis.iter().flat_map(|a| a.tools.iter()) {
        if !seen.insert(tool.name.as_str()) {
            return Err(ValidationError::DuplicateToolName {
                name: tool.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> Value {
        json!({
            "name": name,
            "description": format!("{name} tool"),
            "endpoint": "/ping",
            "method": "GET"
        })
    }

    fn api(name: &str, base_url: &str, tools: Vec<Value>) -> Value {
        json!({
            "name": name,
            "description": "test api",
            "baseUrl": base_url,
            "auth": { "type": "none" },
            "tools": tools
        })
    }

    fn weather_config() -> Value {
        json!({
            "apis": [{
                "name": "weather",
                "description": "Weather API",
                "baseUrl": "https://weather.example.com",
                "auth": { "type": "bearer", "token": "t" },
                "headers": { "Accept": "application/json" },
                "tools": [{
                    "name": "getCurrent",
                    "description": "Current weather",
                    "endpoint": "/current",
                    "method": "get",
                    "parameters": [
                        { "name": "city", "type": "string", "required": true, "location": "query" }
                    ],
                    "transform": { "type": "json", "jsonPath": "$.main", "truncate": 500 }
                }]
            }]
        })
    }

    #[test]
    fn accepts_valid_config() {
        let cfg = validate(&weather_config()).expect("valid");
        assert_eq!(cfg.apis.len(), 1);
        assert_eq!(cfg.tool_count(), 1);
    }

    #[test]
    fn validation_is_idempotent() {
        let first = validate(&weather_config()).expect("valid");
        let again = validate(&serde_json::to_value(&first).expect("serialize")).expect("valid");
        assert_eq!(first, again);
    }

    #[test]
    fn schema_errors_are_listed() {
        let raw = json!({
            "apis": [{
                "name": "x",
                "baseUrl": "https://api.example.com",
                "auth": { "type": "bearer" },
                "tools": []
            }]
        });
        let Err(ValidationError::Schema { violations }) = validate(&raw) else {
            panic!("expected schema error");
        };
        assert!(violations.len() >= 2, "{violations:?}");
    }

    #[test]
    fn auth_modes_cannot_be_mixed() {
        let mut raw = weather_config();
        raw["apis"][0]["auth"] = json!({ "type": "bearer", "token": "t", "username": "u" });
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::Schema { .. })
        ));
    }

    #[test]
    fn rejects_oversized_config() {
        let mut raw = weather_config();
        raw["apis"][0]["description"] = json!("x".repeat(MAX_CONFIG_BYTES));
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::TooLarge { limit: MAX_CONFIG_BYTES, .. })
        ));
    }

    #[test]
    fn config_near_the_size_limit_revalidates() {
        let tools = (0..20)
            .map(|i| {
                let mut t = tool(&format!("t{i}"));
                t["parameters"] = json!(
                    (0..20)
                        .map(|j| json!({ "name": format!("p{j}"), "type": "string" }))
                        .collect::<Vec<_>>()
                );
                t
            })
            .collect();
        let mut raw = json!({ "apis": [api("big", "https://api.example.com", tools)] });
        let base = serde_json::to_string(&raw).expect("serialize").len();
        assert!(base < MAX_CONFIG_BYTES, "fixture already {base} bytes");
        raw["apis"][0]["description"] = json!("d".repeat(MAX_CONFIG_BYTES - base - 10));

        let first = validate(&raw).expect("valid");
        let canonical = serde_json::to_value(&first).expect("serialize");
        assert!(serde_json::to_string(&canonical).expect("serialize").len() <= MAX_CONFIG_BYTES);
        let again = validate(&canonical).expect("still valid");
        assert_eq!(first, again);
    }

    #[test]
    fn rejects_too_many_tools_per_api() {
        let tools = (0..21).map(|i| tool(&format!("t{i}"))).collect();
        let raw = json!({ "apis": [api("big", "https://api.example.com", tools)] });
        let err = validate(&raw).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooManyTools { ref api, count: 21, .. } if api == "big"
        ));
    }

    #[test]
    fn rejects_too_many_tools_in_total() {
        let a = (0..12).map(|i| tool(&format!("a{i}"))).collect();
        let b = (0..12).map(|i| tool(&format!("b{i}"))).collect();
        let raw = json!({
            "apis": [
                api("a", "https://a.example.com", a),
                api("b", "https://b.example.com", b)
            ]
        });
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::TooManyToolsTotal { count: 24, .. })
        ));
    }

    #[test]
    fn rejects_too_many_parameters() {
        let mut t = tool("wide");
        t["parameters"] = json!(
            (0..21)
                .map(|i| json!({ "name": format!("p{i}"), "type": "string" }))
                .collect::<Vec<_>>()
        );
        let raw = json!({ "apis": [api("w", "https://api.example.com", vec![t])] });
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::TooManyParameters { count: 21, .. })
        ));
    }

    #[test]
    fn rejects_unsafe_base_urls() {
        for url in [
            "http://api.example.com",
            "https://localhost/x",
            "https://10.0.0.5/x",
        ] {
            let raw = json!({ "apis": [api("a", url, vec![tool("ping")])] });
            assert!(
                matches!(validate(&raw), Err(ValidationError::UnsafeBaseUrl { .. })),
                "{url} should be rejected"
            );
        }
        let raw = json!({ "apis": [api("a", "https://api.example.com", vec![tool("ping")])] });
        validate(&raw).expect("public https accepted");
    }

    #[test]
    fn permissive_policy_accepts_local_http() {
        let raw = json!({ "apis": [api("a", "http://127.0.0.1:9000", vec![tool("ping")])] });
        validate_with_safety(&raw, &OutboundHttpSafety::permissive()).expect("allowed");
    }

    #[test]
    fn rejects_duplicate_tool_names() {
        let raw = json!({
            "apis": [api("a", "https://api.example.com", vec![tool("ping"), tool("ping")])]
        });
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::DuplicateToolName { ref name }) if name == "ping"
        ));

        let raw = json!({
            "apis": [
                api("a", "https://a.example.com", vec![tool("ping")]),
                api("b", "https://b.example.com", vec![tool("ping")])
            ]
        });
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::DuplicateToolName { .. })
        ));
    }

    #[test]
    fn checks_run_in_order() {
        // Both unsafe URL and duplicate names: URL check comes first.
        let raw = json!({
            "apis": [api("a", "http://api.example.com", vec![tool("ping"), tool("ping")])]
        });
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::UnsafeBaseUrl { .. })
        ));
    }
}
