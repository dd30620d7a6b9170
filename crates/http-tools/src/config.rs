//! Declarative API configuration model.
//!
//! A configuration lists one or more REST APIs; each API owns an ordered list of tools, and each
//! tool an ordered list of parameters. The model is deserialized from JSON (camelCase keys) and is
//! immutable once it has passed [`crate::validate::validate`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level configuration: the APIs exposed through the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApiConfig {
    pub apis: Vec<ApiDefinition>,
}

impl ApiConfig {
    /// Total number of tools across every API.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.apis.iter().map(|a| a.tools.len()).sum()
    }
}

/// One external REST service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApiDefinition {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub auth: AuthConfig,
    pub tools: Vec<ToolDefinition>,

    /// Headers sent with every request to this API.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Default request timeout (milliseconds) for every tool of this API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Authentication mode for an API. Exactly one mode is active.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Bearer { token: String },
    QueryParam { name: String, value: String },
    Header { name: String, value: String },
    Basic { username: String, password: String },
    None,
}

impl AuthConfig {
    /// Header name carrying the credential, if this mode uses one.
    #[must_use]
    pub fn credential_header(&self) -> Option<&str> {
        match self {
            AuthConfig::Bearer { .. } | AuthConfig::Basic { .. } => Some("authorization"),
            AuthConfig::Header { name, .. } => Some(name.as_str()),
            AuthConfig::QueryParam { .. } | AuthConfig::None => None,
        }
    }
}

/// One callable operation backed by a single REST endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,

    /// Path template relative to the API base URL, e.g. `/users/{id}`.
    pub endpoint: String,

    pub method: HttpMethod,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<ResponseTransform>,

    /// Header overrides layered on top of the API default headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Request timeout (milliseconds); overrides the API default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// HTTP method; accepted in any letter case, serialized upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl HttpMethod {
    #[must_use]
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

/// A single tool input.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "ParamLocation::is_default")]
    pub location: ParamLocation,

    /// Name used on the wire when it differs from the tool-facing name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,

    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ParameterDefinition {
    /// Name used in the outgoing request (query key, body field, header name).
    #[must_use]
    pub fn wire_name(&self) -> &str {
        self.mapping.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    #[default]
    Query,
    Body,
    Header,
}

impl ParamLocation {
    fn is_default(&self) -> bool {
        *self == ParamLocation::default()
    }
}

/// How a successful response body is shaped before it is returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResponseTransform {
    #[serde(rename = "type")]
    pub kind: ResponseKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,

    /// `{{path}}` substitution template, rendered after `jsonPath` extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Where to look for an error message in a failed response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,

    /// Maximum serialized size of the result, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Json,
    Text,
    Raw,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_config_with_defaults() {
        let cfg: ApiConfig = serde_json::from_value(json!({
            "apis": [{
                "name": "weather",
                "description": "Weather API",
                "baseUrl": "https://weather.example.com",
                "auth": { "type": "query_param", "name": "appid", "value": "k" },
                "tools": [{
                    "name": "getCurrent",
                    "description": "Current conditions",
                    "endpoint": "/current",
                    "method": "get",
                    "parameters": [
                        { "name": "city", "type": "string", "required": true }
                    ],
                    "transform": { "type": "json", "jsonPath": "$.main" }
                }]
            }]
        }))
        .expect("valid config");

        let api = &cfg.apis[0];
        assert_eq!(
            api.auth,
            AuthConfig::QueryParam {
                name: "appid".into(),
                value: "k".into()
            }
        );
        let tool = &api.tools[0];
        assert_eq!(tool.method, HttpMethod::Get);
        assert_eq!(tool.parameters[0].location, ParamLocation::Query);
        assert_eq!(tool.parameters[0].wire_name(), "city");
        assert_eq!(
            tool.transform.as_ref().and_then(|t| t.json_path.as_deref()),
            Some("$.main")
        );
    }

    #[test]
    fn auth_tag_selects_variant_fields() {
        let auth: AuthConfig = serde_json::from_value(json!({
            "type": "basic",
            "username": "u",
            "password": "p"
        }))
        .expect("basic auth");
        assert_eq!(auth.credential_header(), Some("authorization"));

        let auth: AuthConfig = serde_json::from_value(json!({ "type": "none" })).expect("none");
        assert_eq!(auth, AuthConfig::None);
        assert!(serde_json::from_value::<AuthConfig>(json!({ "type": "bearer" })).is_err());
    }

    #[test]
    fn methods_are_case_insensitive() {
        for raw in ["get", "GET", "Get"] {
            let m: HttpMethod = serde_json::from_value(json!(raw)).expect("method");
            assert_eq!(m, HttpMethod::Get);
        }
        assert_eq!(serde_json::to_value(HttpMethod::Patch).expect("ser"), json!("PATCH"));
        assert!(serde_json::from_value::<HttpMethod>(json!("TRACE")).is_err());
    }

    #[test]
    fn serialization_omits_unset_optionals() {
        let p = ParameterDefinition {
            name: "q".into(),
            description: String::new(),
            param_type: ParamType::String,
            required: false,
            default: None,
            location: ParamLocation::Query,
            mapping: None,
            enum_values: None,
            pattern: None,
        };
        let v = serde_json::to_value(&p).expect("serialize");
        assert!(v.get("default").is_none());
        assert!(v.get("enum").is_none());
        assert!(v.get("description").is_none());
        assert!(v.get("required").is_none());
        assert!(v.get("location").is_none());
        assert_eq!(v, json!({ "name": "q", "type": "string" }));
    }
}
