//! Tool registry: turns a validated [`ApiConfig`] into named, callable tools.
//!
//! A [`ToolRegistry`] is built once and never mutated. It is cheap to clone and safe to share
//! across tasks; a new configuration means a new registry.

use crate::client::{
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT_MS, HttpClient, OutboundRequest,
};
use crate::config::{ApiConfig, ApiDefinition, ToolDefinition};
use crate::error::{GatewayError, RegistryError, SchemaViolation};
use crate::mapping::{input_schema, map_parameters};
use crate::response_shaping::{
    DEFAULT_MAX_RESPONSE_BYTES, effective_limit, extract_error_message, to_text, transform,
    truncate,
};
use crate::safety::OutboundHttpSafety;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const API_PREFIX_MAX_CHARS: usize = 8;
const TOOL_NAME_MAX_CHARS: usize = 64;

/// Knobs shared by every tool of a registry.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub safety: OutboundHttpSafety,
    /// Used when neither the tool nor its API sets a timeout.
    pub default_timeout_ms: u64,
    pub max_concurrent_requests: usize,
    /// Global cap on result text; per-tool `truncate` can only lower it.
    pub max_response_bytes: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            safety: OutboundHttpSafety::strict(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

struct RegisteredTool {
    name: String,
    api_index: usize,
    tool_index: usize,
    input_schema: Value,
    validator: jsonschema::Validator,
}

struct RegistryInner {
    config: ApiConfig,
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
    client: HttpClient,
    default_timeout_ms: u64,
    max_response_bytes: usize,
}

#[derive(Clone)]
pub struct ToolRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish_non_exhaustive()
    }
}

/// Derive the public tool name from an API name and a tool name.
///
/// The API name is reduced to ASCII letters, digits, `-` and `_` (falling back to `api`) and cut
/// to 8 characters; the tool name is appended with its first character upper-cased. The result is
/// capped at 64 characters.
#[must_use]
pub fn derive_tool_name(api_name: &str, tool_name: &str) -> String {
    let mut prefix: String = api_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(API_PREFIX_MAX_CHARS)
        .collect();
    if prefix.is_empty() {
        prefix.push_str("api");
    }

    let mut chars = tool_name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    let full = format!("{prefix}{capitalized}");
    if full.chars().count() > TOOL_NAME_MAX_CHARS {
        let cut: String = full.chars().take(TOOL_NAME_MAX_CHARS).collect();
        warn!(
            api = %api_name,
            tool = %tool_name,
            name = %cut,
            "generated tool name exceeds {TOOL_NAME_MAX_CHARS} characters; truncated"
        );
        return cut;
    }
    full
}

impl ToolRegistry {
    /// Build the registry from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if two tools derive the same name, a parameter list produces an
    /// unusable input schema, or the HTTP client cannot be built.
    pub fn new(config: ApiConfig, options: RegistryOptions) -> Result<Self, RegistryError> {
        let client = HttpClient::new(options.safety, options.max_concurrent_requests)
            .map_err(|e| RegistryError::Client(e.message))?;

        let mut tools = Vec::with_capacity(config.tool_count());
        let mut by_name = HashMap::new();
        for (api_index, api) in config.apis.iter().enumerate() {
            for (tool_index, def) in api.tools.iter().enumerate() {
                let name = derive_tool_name(&api.name, &def.name);
                if by_name.contains_key(&name) {
                    return Err(RegistryError::DuplicateToolName {
                        name,
                        api: api.name.clone(),
                        tool: def.name.clone(),
                    });
                }

                let schema = input_schema(&def.parameters);
                let validator = jsonschema::validator_for(&schema).map_err(|e| {
                    RegistryError::InvalidInputSchema {
                        tool: name.clone(),
                        message: e.to_string(),
                    }
                })?;

                debug!(tool = %name, api = %api.name, method = def.method.as_str(), endpoint = %def.endpoint, "registered tool");
                by_name.insert(name.clone(), tools.len());
                tools.push(RegisteredTool {
                    name,
                    api_index,
                    tool_index,
                    input_schema: schema,
                    validator,
                });
            }
        }

        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                tools,
                by_name,
                client,
                default_timeout_ms: options.default_timeout_ms,
                max_response_bytes: options.max_response_bytes,
            }),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.tools.is_empty()
    }

    /// Generated names in configuration order.
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.inner.tools.iter().map(|t| t.name.as_str()).collect()
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Resolve a generated name to its `(API, tool)` pair.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<(&ApiDefinition, &ToolDefinition)> {
        self.lookup(name).map(|t| self.pair(t))
    }

    fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.inner
            .by_name
            .get(name)
            .map(|&idx| &self.inner.tools[idx])
    }

    fn pair(&self, tool: &RegisteredTool) -> (&ApiDefinition, &ToolDefinition) {
        let api = &self.inner.config.apis[tool.api_index];
        (api, &api.tools[tool.tool_index])
    }

    /// List every tool as an MCP `Tool` (name, description, input schema, annotations).
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.inner
            .tools
            .iter()
            .map(|t| {
                let (_, def) = self.pair(t);
                let schema_obj = t
                    .input_schema
                    .as_object()
                    .cloned()
                    .unwrap_or_else(JsonObject::new);
                let mut tool = Tool::new(t.name.clone(), def.description.clone(), Arc::new(schema_obj));
                tool.annotations = Some(crate::semantics::annotations_for_method(def.method));
                tool
            })
            .collect()
    }

    /// Invoke a tool by its generated name.
    ///
    /// `null` arguments are treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the tool is unknown, the arguments violate the input schema,
    /// a required parameter is missing, or the HTTP request fails.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<CallToolResult, GatewayError> {
        let tool = self
            .lookup(name)
            .ok_or_else(|| GatewayError::UnknownTool(name.to_string()))?;
        let (api, def) = self.pair(tool);

        let args = if args.is_null() {
            Value::Object(Map::new())
        } else {
            args
        };

        let violations: Vec<SchemaViolation> = tool
            .validator
            .iter_errors(&args)
            .map(|e| SchemaViolation {
                instance_path: e.instance_path().to_string(),
                message: e.to_string(),
            })
            .collect();
        if !violations.is_empty() {
            return Err(GatewayError::InvalidArguments {
                tool: tool.name.clone(),
                violations,
            });
        }

        let mapped = map_parameters(&args, &def.parameters, &def.endpoint).map_err(|source| {
            GatewayError::Mapping {
                tool: tool.name.clone(),
                source,
            }
        })?;

        let timeout_ms = def
            .timeout
            .or(api.timeout)
            .unwrap_or(self.inner.default_timeout_ms);

        let outcome = self
            .inner
            .client
            .send(OutboundRequest {
                method: def.method,
                base_url: &api.base_url,
                mapped,
                auth: &api.auth,
                default_headers: &api.headers,
                tool_headers: &def.headers,
                timeout_ms,
            })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                let error_path = def.transform.as_ref().and_then(|t| t.error_path.as_deref());
                let message = extract_error_message(&e.body, error_path, &e.message);
                warn!(
                    tool = %tool.name,
                    api = %api.name,
                    status = e.status_code,
                    kind = ?e.kind,
                    error = %message,
                    "tool call failed"
                );
                return Err(GatewayError::Http {
                    tool: tool.name.clone(),
                    status_code: e.status_code,
                    message,
                    source: e,
                });
            }
        };

        let shaped = transform(response.body, def.transform.as_ref());
        let limit = effective_limit(def.transform.as_ref(), self.inner.max_response_bytes);
        let text = truncate(to_text(&shaped), limit);
        debug!(
            tool = %tool.name,
            status = response.status_code,
            bytes = text.len(),
            "tool call succeeded"
        );
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}
