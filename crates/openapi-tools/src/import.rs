//! OpenAPI 3 document -> draft API configuration.
//!
//! The draft is a starting point for an operator: it is not validated, and auth credentials are
//! emitted as `${VAR}` placeholders.

use crate::error::Result;
use crate::resolver::LocalResolver;
use openapiv3::{
    APIKeyLocation, MediaType, OpenAPI, Operation, Parameter, ParameterSchemaOrContent,
    ReferenceOr, RequestBody, Schema, SchemaKind, SecurityScheme, StatusCode, Type,
};
use regex::Regex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;
use toolgate_http_tools::config::{
    ApiConfig, ApiDefinition, AuthConfig, HttpMethod, ParamLocation, ParamType,
    ParameterDefinition, ToolDefinition,
};
use tracing::{debug, warn};

static PATH_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("path template regex"));
static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("non-alnum regex"));

const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// API name; defaults to the sanitized `info.title`.
    pub api_name: Option<String>,
    /// Base URL; defaults to the first server URL.
    pub base_url: Option<String>,
    /// `METHOD /path` glob patterns (`*`, `?`). Empty means every operation.
    pub include: Vec<String>,
    /// Exclusions win over inclusions.
    pub exclude: Vec<String>,
}

/// Result of an import: the draft config plus one example response per tool when the document
/// provides one.
#[derive(Debug, Clone)]
pub struct ImportedApi {
    pub config: ApiConfig,
    /// Tool name -> example body of its first documented 2xx response.
    pub previews: BTreeMap<String, Value>,
    /// Operations that could not be converted, as `METHOD /path: reason`.
    pub skipped: Vec<String>,
}

/// Convert `spec` into a single-API draft.
///
/// Operations that fail to convert are skipped with a warning rather than aborting the import.
///
/// # Errors
///
/// Returns an error only if the document cannot be prepared for `$ref` resolution.
pub fn import_openapi(spec: &OpenAPI, options: &ImportOptions) -> Result<ImportedApi> {
    let resolver = LocalResolver::new(spec)?;
    let mut tools = Vec::new();
    let mut previews = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut names: HashSet<String> = HashSet::new();

    for (path, item) in &spec.paths.paths {
        let item = match resolver.resolve(item) {
            Ok(item) => item,
            Err(e) => {
                warn!(path = %path, error = %e, "skipping path");
                skipped.push(format!("* {path}: {e}"));
                continue;
            }
        };

        let ops = [
            (HttpMethod::Get, &item.get),
            (HttpMethod::Put, &item.put),
            (HttpMethod::Post, &item.post),
            (HttpMethod::Delete, &item.delete),
            (HttpMethod::Options, &item.options),
            (HttpMethod::Head, &item.head),
            (HttpMethod::Patch, &item.patch),
        ];
        for (method, op) in ops {
            let Some(op) = op else { continue };
            let label = format!("{} {path}", method.as_str());
            if !should_import(&label, options) {
                debug!(operation = %label, "operation filtered out");
                continue;
            }

            match convert_operation(&resolver, path, method, &item.parameters, op) {
                Ok(mut tool) => {
                    tool.name = reserve_unique_name(&mut names, &tool.name);
                    if let Some(example) = response_preview(&resolver, op) {
                        previews.insert(tool.name.clone(), example);
                    }
                    tools.push(tool);
                }
                Err(reason) => {
                    warn!(operation = %label, reason = %reason, "skipping operation");
                    skipped.push(format!("{label}: {reason}"));
                }
            }
        }
    }

    let name = options
        .api_name
        .clone()
        .unwrap_or_else(|| sanitize_api_name(&spec.info.title));
    let base_url = options
        .base_url
        .clone()
        .or_else(|| spec.servers.first().map(|s| s.url.clone()))
        .unwrap_or_default();
    if base_url.is_empty() {
        warn!("OpenAPI document declares no servers; baseUrl left empty");
    }

    let api = ApiDefinition {
        name,
        description: spec
            .info
            .description
            .clone()
            .unwrap_or_else(|| spec.info.title.clone()),
        base_url,
        auth: infer_auth(&resolver, spec),
        tools,
        headers: BTreeMap::new(),
        timeout: None,
    };

    Ok(ImportedApi {
        config: ApiConfig { apis: vec![api] },
        previews,
        skipped,
    })
}

fn should_import(label: &str, options: &ImportOptions) -> bool {
    if options.exclude.iter().any(|p| glob_match(p, label)) {
        return false;
    }
    options.include.is_empty() || options.include.iter().any(|p| glob_match(p, label))
}

fn convert_operation(
    resolver: &LocalResolver,
    path: &str,
    method: HttpMethod,
    path_item_params: &[ReferenceOr<Parameter>],
    op: &Operation,
) -> std::result::Result<ToolDefinition, String> {
    let name = op
        .operation_id
        .clone()
        .unwrap_or_else(|| canonical_name(method, path));
    let description = op
        .summary
        .clone()
        .or_else(|| op.description.clone())
        .unwrap_or_else(|| format!("Calls {} {path}", method.as_str()));

    let mut parameters = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for param in merge_parameters(resolver, path_item_params, &op.parameters)? {
        let Some(def) = convert_parameter(resolver, &param) else {
            continue;
        };
        if !seen.insert(def.name.clone()) {
            return Err(format!("parameter '{}' appears more than once", def.name));
        }
        parameters.push(def);
    }

    if let Some(body) = &op.request_body {
        let body = resolver.resolve(body).map_err(|e| e.to_string())?;
        for def in body_parameters(resolver, &body)? {
            if !seen.insert(def.name.clone()) {
                warn!(parameter = %def.name, "body property collides with a path/query parameter; skipped");
                continue;
            }
            parameters.push(def);
        }
    }

    Ok(ToolDefinition {
        name,
        description,
        endpoint: path.to_string(),
        method,
        parameters,
        transform: None,
        headers: BTreeMap::new(),
        timeout: None,
    })
}

/// Path-level parameters overlaid by operation-level ones (same `(in, name)` wins).
fn merge_parameters(
    resolver: &LocalResolver,
    path_item_params: &[ReferenceOr<Parameter>],
    operation_params: &[ReferenceOr<Parameter>],
) -> std::result::Result<Vec<Parameter>, String> {
    fn key_for(p: &Parameter) -> (&'static str, String) {
        let loc = match p {
            Parameter::Path { .. } => "path",
            Parameter::Query { .. } => "query",
            Parameter::Header { .. } => "header",
            Parameter::Cookie { .. } => "cookie",
        };
        (loc, p.parameter_data_ref().name.clone())
    }

    let mut merged: Vec<Parameter> = Vec::new();
    let mut index: HashMap<(&'static str, String), usize> = HashMap::new();
    for p in path_item_params.iter().chain(operation_params) {
        let p = resolver.resolve(p).map_err(|e| e.to_string())?;
        let key = key_for(&p);
        if let Some(&i) = index.get(&key) {
            merged[i] = p;
        } else {
            index.insert(key, merged.len());
            merged.push(p);
        }
    }
    Ok(merged)
}

fn convert_parameter(resolver: &LocalResolver, param: &Parameter) -> Option<ParameterDefinition> {
    let (location, data) = match param {
        Parameter::Path { parameter_data, .. } => (ParamLocation::Path, parameter_data),
        Parameter::Query { parameter_data, .. } => (ParamLocation::Query, parameter_data),
        Parameter::Header { parameter_data, .. } => (ParamLocation::Header, parameter_data),
        Parameter::Cookie { parameter_data, .. } => {
            warn!(parameter = %parameter_data.name, "cookie parameters are not supported; skipped");
            return None;
        }
    };

    let schema = match &data.format {
        ParameterSchemaOrContent::Schema(s) => resolver.resolve(s).ok(),
        ParameterSchemaOrContent::Content(_) => None,
    };

    let mut def = schema
        .as_ref()
        .map_or_else(|| bare_parameter(&data.name), |s| parameter_from_schema(&data.name, s));
    def.location = location;
    // Path parameters are always required.
    def.required = data.required || location == ParamLocation::Path;
    if let Some(desc) = &data.description {
        def.description.clone_from(desc);
    }
    Some(def)
}

fn bare_parameter(name: &str) -> ParameterDefinition {
    ParameterDefinition {
        name: name.to_string(),
        description: String::new(),
        param_type: ParamType::String,
        required: false,
        default: None,
        location: ParamLocation::Query,
        mapping: None,
        enum_values: None,
        pattern: None,
    }
}

fn parameter_from_schema(name: &str, schema: &Schema) -> ParameterDefinition {
    let mut def = bare_parameter(name);
    def.description = schema.schema_data.description.clone().unwrap_or_default();
    def.default.clone_from(&schema.schema_data.default);

    match &schema.schema_kind {
        SchemaKind::Type(Type::String(s)) => {
            def.param_type = ParamType::String;
            def.pattern.clone_from(&s.pattern);
            let values: Vec<Value> = s.enumeration.iter().flatten().map(|v| json!(v)).collect();
            if !values.is_empty() {
                def.enum_values = Some(values);
            }
        }
        SchemaKind::Type(Type::Number(n)) => {
            def.param_type = ParamType::Number;
            let values: Vec<Value> = n.enumeration.iter().flatten().map(|v| json!(v)).collect();
            if !values.is_empty() {
                def.enum_values = Some(values);
            }
        }
        SchemaKind::Type(Type::Integer(i)) => {
            def.param_type = ParamType::Number;
            let values: Vec<Value> = i.enumeration.iter().flatten().map(|v| json!(v)).collect();
            if !values.is_empty() {
                def.enum_values = Some(values);
            }
        }
        SchemaKind::Type(Type::Boolean(_)) => def.param_type = ParamType::Boolean,
        SchemaKind::Type(Type::Array(_)) => def.param_type = ParamType::Array,
        _ => def.param_type = ParamType::Object,
    }
    def
}

/// Flatten a JSON object request body into `body` parameters.
fn body_parameters(
    resolver: &LocalResolver,
    body: &RequestBody,
) -> std::result::Result<Vec<ParameterDefinition>, String> {
    let Some(media) = json_media_type(&body.content) else {
        return Ok(Vec::new());
    };
    let Some(schema_ref) = &media.schema else {
        return Ok(Vec::new());
    };
    let schema = resolver.resolve(schema_ref).map_err(|e| e.to_string())?;

    let SchemaKind::Type(Type::Object(obj)) = &schema.schema_kind else {
        return Err("request body is not a JSON object schema".to_string());
    };

    let mut out = Vec::new();
    for (prop, prop_schema) in &obj.properties {
        let resolved = match prop_schema {
            ReferenceOr::Item(s) => Some((**s).clone()),
            ReferenceOr::Reference { reference } => {
                resolver.resolve(&ReferenceOr::<Schema>::ref_(reference)).ok()
            }
        };
        let mut def = resolved
            .as_ref()
            .map_or_else(|| bare_parameter(prop), |s| parameter_from_schema(prop, s));
        def.location = ParamLocation::Body;
        // An optional body never makes its properties required.
        def.required = body.required && obj.required.contains(prop);
        out.push(def);
    }
    Ok(out)
}

fn json_media_type(content: &openapiv3::Content) -> Option<&MediaType> {
    content.get("application/json").or_else(|| {
        content.iter().find_map(|(k, v)| {
            let lower = k.to_ascii_lowercase();
            lower.ends_with("+json").then_some(v)
        })
    })
}

/// Example body of the first documented 2xx response, if any.
fn response_preview(resolver: &LocalResolver, op: &Operation) -> Option<Value> {
    let mut codes: Vec<(u16, &ReferenceOr<openapiv3::Response>)> = op
        .responses
        .responses
        .iter()
        .filter_map(|(code, resp)| match code {
            StatusCode::Code(n) if (200..300).contains(n) => Some((*n, resp)),
            StatusCode::Range(2) => Some((299, resp)),
            _ => None,
        })
        .collect();
    codes.sort_by_key(|(n, _)| *n);

    let (_, resp) = codes.first()?;
    let resp = resolver.resolve(resp).ok()?;
    let media = json_media_type(&resp.content)?;
    if let Some(example) = &media.example {
        return Some(example.clone());
    }
    media
        .examples
        .values()
        .find_map(|ex| resolver.resolve(ex).ok().and_then(|ex| ex.value))
}

fn infer_auth(resolver: &LocalResolver, spec: &OpenAPI) -> AuthConfig {
    let Some(components) = &spec.components else {
        return AuthConfig::None;
    };
    for scheme in components.security_schemes.values() {
        let Ok(scheme) = resolver.resolve(scheme) else {
            continue;
        };
        match scheme {
            SecurityScheme::HTTP { scheme, .. } if scheme.eq_ignore_ascii_case("bearer") => {
                return AuthConfig::Bearer {
                    token: "${API_TOKEN}".to_string(),
                };
            }
            SecurityScheme::HTTP { scheme, .. } if scheme.eq_ignore_ascii_case("basic") => {
                return AuthConfig::Basic {
                    username: "${API_USERNAME}".to_string(),
                    password: "${API_PASSWORD}".to_string(),
                };
            }
            SecurityScheme::APIKey {
                location: APIKeyLocation::Header,
                name,
                ..
            } => {
                return AuthConfig::Header {
                    name,
                    value: "${API_KEY}".to_string(),
                };
            }
            SecurityScheme::APIKey {
                location: APIKeyLocation::Query,
                name,
                ..
            } => {
                return AuthConfig::QueryParam {
                    name,
                    value: "${API_KEY}".to_string(),
                };
            }
            _ => {}
        }
    }
    AuthConfig::None
}

fn sanitize_api_name(title: &str) -> String {
    let name: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        "api".to_string()
    } else {
        name
    }
}

/// `method_path` name for operations without an `operationId`, e.g. `get_pet_petId`.
#[must_use]
pub fn canonical_name(method: HttpMethod, path: &str) -> String {
    let raw = format!("{}_{}", method.as_str().to_lowercase(), path);
    let raw = PATH_TEMPLATE.replace_all(&raw, "_$1");
    let mut name = NON_ALNUM
        .replace_all(&raw, "_")
        .trim_matches('_')
        .to_string();
    name.truncate(MAX_NAME_LEN);
    name
}

fn reserve_unique_name(names: &mut HashSet<String>, base: &str) -> String {
    if names.insert(base.to_string()) {
        return base.to_string();
    }
    let mut counter = 1;
    loop {
        let candidate = format!("{base}_{counter}");
        if names.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Byte-wise glob: `*` matches any run, `?` any single byte.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some(b'*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(b'?') => {
                pi += 1;
                ti += 1;
            }
            Some(&b) if b == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => {
                let Some((sp, st)) = star else {
                    return false;
                };
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
        }
    }
    while p.get(pi) == Some(&b'*') {
        pi += 1;
    }
    pi == p.len()
}
