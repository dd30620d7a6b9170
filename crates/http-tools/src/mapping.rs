//! Caller arguments -> HTTP request fragments.
//!
//! Mapping is synchronous and performs no I/O: it only decides where each argument lands
//! (path / query / body / header). The same parameter list also produces the JSON Schema that is
//! advertised to callers and used to validate their arguments.

use crate::config::{ParamLocation, ParameterDefinition};
use crate::error::MappingError;
use serde_json::{Map, Value, json};

/// Request fragments produced from one set of caller arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRequest {
    /// Endpoint with path placeholders substituted.
    pub path: String,
    /// Query pairs in declaration order (arrays expand to repeated keys).
    pub query: Vec<(String, String)>,
    pub body: Map<String, Value>,
    pub headers: Vec<(String, String)>,
}

/// Map `args` onto `params` for the endpoint template `endpoint`.
///
/// # Errors
///
/// Returns [`MappingError::MissingParameter`] for the first required parameter that has neither
/// an argument nor a default.
pub fn map_parameters(
    args: &Value,
    params: &[ParameterDefinition],
    endpoint: &str,
) -> Result<MappedRequest, MappingError> {
    let mut out = MappedRequest {
        path: endpoint.to_string(),
        ..MappedRequest::default()
    };

    for param in params {
        let value = args
            .get(&param.name)
            .filter(|v| !v.is_null())
            .or_else(|| param.default.as_ref().filter(|v| !v.is_null()));

        let Some(value) = value else {
            if param.required {
                return Err(MappingError::MissingParameter(param.name.clone()));
            }
            continue;
        };

        match param.location {
            ParamLocation::Path => {
                let encoded = encode_component(&value_to_string(value));
                out.path = out.path.replace(&format!("{{{}}}", param.name), &encoded);
            }
            ParamLocation::Query => {
                let key = param.wire_name();
                out.query.retain(|(k, _)| k != key);
                match value {
                    Value::Array(items) => out.query.extend(
                        items
                            .iter()
                            .map(|item| (key.to_string(), value_to_string(item))),
                    ),
                    scalar => out.query.push((key.to_string(), value_to_string(scalar))),
                }
            }
            ParamLocation::Body => {
                out.body.insert(param.wire_name().to_string(), value.clone());
            }
            ParamLocation::Header => {
                let key = param.wire_name();
                out.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
                out.headers.push((key.to_string(), value_to_string(value)));
            }
        }
    }

    Ok(out)
}

/// Plain string form used on the wire: strings unquoted, containers as JSON text.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
#[must_use]
pub fn encode_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Derive the tool input schema from its parameter list.
///
/// Parameters that are required but carry a default are advertised as optional: the default
/// satisfies them at mapping time.
#[must_use]
pub fn input_schema(params: &[ParameterDefinition]) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for param in params {
        let mut prop = json!({ "type": param.param_type.as_str() });
        if !param.description.is_empty() {
            prop["description"] = json!(param.description);
        }
        if let Some(values) = &param.enum_values {
            prop["enum"] = json!(values);
        }
        if let Some(default) = &param.default {
            prop["default"] = default.clone();
        }
        if let Some(pattern) = &param.pattern {
            prop["pattern"] = json!(pattern);
        }
        properties.insert(param.name.clone(), prop);

        if param.required && param.default.is_none() {
            required.push(param.name.clone());
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamType;

    fn param(name: &str, location: ParamLocation, required: bool) -> ParameterDefinition {
        ParameterDefinition {
            name: name.to_string(),
            description: String::new(),
            param_type: ParamType::String,
            required,
            default: None,
            location,
            mapping: None,
            enum_values: None,
            pattern: None,
        }
    }

    #[test]
    fn maps_every_location() {
        let mut trace = param("trace", ParamLocation::Header, false);
        trace.mapping = Some("X-Trace".to_string());
        let mut q = param("q", ParamLocation::Query, false);
        q.mapping = Some("query".to_string());
        let params = vec![
            param("id", ParamLocation::Path, true),
            q,
            param("title", ParamLocation::Body, false),
            trace,
        ];

        let mapped = map_parameters(
            &json!({ "id": "a b/c", "q": "rust", "title": "hi", "trace": 7 }),
            &params,
            "/items/{id}/sub/{id}",
        )
        .expect("mapped");

        assert_eq!(mapped.path, "/items/a%20b%2Fc/sub/a%20b%2Fc");
        assert_eq!(mapped.query, vec![("query".to_string(), "rust".to_string())]);
        assert_eq!(mapped.body.get("title"), Some(&json!("hi")));
        assert_eq!(
            mapped.headers,
            vec![("X-Trace".to_string(), "7".to_string())]
        );
    }

    #[test]
    fn missing_required_parameter_is_named() {
        let params = vec![
            param("ok", ParamLocation::Query, true),
            param("city", ParamLocation::Query, true),
            param("later", ParamLocation::Query, true),
        ];
        let err = map_parameters(&json!({ "ok": "1", "later": 3 }), &params, "/x").unwrap_err();
        assert_eq!(err, MappingError::MissingParameter("city".to_string()));
    }

    #[test]
    fn explicit_null_counts_as_missing() {
        let params = vec![param("city", ParamLocation::Query, true)];
        assert!(map_parameters(&json!({ "city": null }), &params, "/x").is_err());
    }

    #[test]
    fn defaults_fill_absent_arguments_and_optionals_are_skipped() {
        let mut units = param("units", ParamLocation::Query, true);
        units.default = Some(json!("metric"));
        let params = vec![units, param("lang", ParamLocation::Query, false)];

        let mapped = map_parameters(&json!({}), &params, "/weather").expect("mapped");
        assert_eq!(
            mapped.query,
            vec![("units".to_string(), "metric".to_string())]
        );
        assert!(mapped.body.is_empty());
        assert!(mapped.headers.is_empty());
    }

    #[test]
    fn array_query_values_repeat_the_key() {
        let params = vec![param("tag", ParamLocation::Query, false)];
        let mapped = map_parameters(&json!({ "tag": ["a", 2] }), &params, "/t").expect("mapped");
        assert_eq!(
            mapped.query,
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn input_schema_reflects_type_required_enum_and_default() {
        let mut units = param("units", ParamLocation::Query, true);
        units.default = Some(json!("metric"));
        units.enum_values = Some(vec![json!("metric"), json!("imperial")]);
        let mut days = param("days", ParamLocation::Query, false);
        days.param_type = ParamType::Number;
        days.description = "Forecast days".to_string();
        let params = vec![param("city", ParamLocation::Query, true), units, days];

        let schema = input_schema(&params);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["city"]));
        assert_eq!(schema["properties"]["units"]["default"], "metric");
        assert_eq!(
            schema["properties"]["units"]["enum"],
            json!(["metric", "imperial"])
        );
        assert_eq!(schema["properties"]["days"]["type"], "number");
        assert_eq!(schema["properties"]["days"]["description"], "Forecast days");
    }

    #[test]
    fn input_schema_without_required_omits_the_key() {
        let schema = input_schema(&[param("q", ParamLocation::Query, false)]);
        assert!(schema.get("required").is_none());
    }
}
