//! Outbound HTTP execution for tool calls.
//!
//! One [`HttpClient`] is shared by every tool of a registry. It owns the `reqwest` client (and thus
//! the connection pool), the outbound safety policy and the concurrency limit.

use crate::config::{AuthConfig, HttpMethod};
use crate::error::{HttpError, HttpErrorKind};
use crate::mapping::{MappedRequest, encode_component};
use crate::safety::{
    OutboundHttpSafety, RedirectPolicy, redact_headers, redact_url, sanitize_reqwest_error,
};
use base64::Engine as _;
use mime::Mime;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Everything needed to issue one request.
#[derive(Debug, Clone)]
pub struct OutboundRequest<'a> {
    pub method: HttpMethod,
    pub base_url: &'a str,
    pub mapped: MappedRequest,
    pub auth: &'a AuthConfig,
    /// API default headers.
    pub default_headers: &'a BTreeMap<String, String>,
    /// Tool-level header overrides.
    pub tool_headers: &'a BTreeMap<String, String>,
    pub timeout_ms: u64,
}

/// A successful (status < 400) response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    safety: Arc<OutboundHttpSafety>,
    permits: Arc<Semaphore>,
}

impl HttpClient {
    /// Build a client honoring the safety policy's redirect rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS/HTTP client cannot be constructed.
    pub fn new(safety: OutboundHttpSafety, max_concurrent_requests: usize) -> Result<Self, HttpError> {
        let redirect = match safety.redirects {
            RedirectPolicy::None => reqwest::redirect::Policy::none(),
            RedirectPolicy::Follow => reqwest::redirect::Policy::default(),
        };
        let client = Client::builder()
            .redirect(redirect)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| HttpError::transport(sanitize_reqwest_error(&e)))?;

        Ok(Self {
            client,
            safety: Arc::new(safety),
            permits: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        })
    }

    #[must_use]
    pub fn safety(&self) -> &OutboundHttpSafety {
        &self.safety
    }

    /// Send one request and parse the response.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] on transport failure, timeout, policy rejection, oversized body,
    /// or any status >= 400.
    pub async fn send(&self, req: OutboundRequest<'_>) -> Result<HttpResponse, HttpError> {
        let mut query = req.mapped.query.clone();
        if let AuthConfig::QueryParam { name, value } = req.auth {
            query.push((name.clone(), value.clone()));
        }
        let url = build_url(req.base_url, &req.mapped.path, &query)?;

        self.safety
            .check_url(&url)
            .await
            .map_err(|reason| HttpError::transport(format!("Outbound HTTP blocked: {reason}")))?;

        let mut headers = merge_headers(req.default_headers, req.tool_headers, &req.mapped.headers);
        if let Some(credential) = req.auth.credential_header() {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(credential));
        }
        debug!(
            method = req.method.as_str(),
            url = %redact_url(&url),
            headers = ?redact_headers(&headers, req.auth.credential_header()),
            timeout_ms = req.timeout_ms,
            "sending HTTP tool request"
        );

        let mut request = self.client.request(req.method.as_reqwest(), url);
        for (k, v) in &headers {
            request = request.header(k, v);
        }
        request = apply_auth(req.auth, request);
        if !req.mapped.body.is_empty() {
            request = request.json(&req.mapped.body);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| HttpError::transport("HTTP client is shutting down"))?;

        let timeout = Duration::from_millis(req.timeout_ms);
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| HttpError::timeout("response headers", req.timeout_ms))?
            .map_err(|e| map_reqwest_error(&e, req.timeout_ms))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = tokio::time::timeout(
            timeout,
            read_body_limited(response, self.safety.max_response_bytes, status.as_u16()),
        )
        .await
        .map_err(|_| HttpError::timeout("response body", req.timeout_ms))??;

        let body = parse_body(&bytes, content_type.as_deref());
        if status.as_u16() >= 400 {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            return Err(HttpError {
                kind: HttpErrorKind::Status,
                status_code: status.as_u16(),
                message: format!("API returned {} {reason}", status.as_u16()),
                body,
            });
        }

        Ok(HttpResponse {
            status_code: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn map_reqwest_error(e: &reqwest::Error, timeout_ms: u64) -> HttpError {
    if e.is_timeout() {
        return HttpError::timeout("response headers", timeout_ms);
    }
    HttpError::transport(format!("http transport error: {}", sanitize_reqwest_error(e)))
}

async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
    status_code: u16,
) -> Result<Vec<u8>, HttpError> {
    let too_large = |message: String| HttpError {
        kind: HttpErrorKind::BodyTooLarge,
        status_code,
        body: Value::Null,
        message,
    };

    if let Some(max) = max_bytes
        && let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(too_large(format!(
            "Response too large: {len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| HttpError::transport(sanitize_reqwest_error(&e)))?
    {
        if let Some(max) = max_bytes
            && out.len().saturating_add(chunk.len()) > max
        {
            return Err(too_large(format!(
                "Response too large: exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let Ok(m) = ct.parse::<Mime>() else {
        return false;
    };
    m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
}

/// Parse a response body: JSON for JSON content types, text otherwise, base64 for binary.
#[must_use]
pub fn parse_body(bytes: &[u8], content_type: Option<&str>) -> Value {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        });
    };
    if is_json_content_type(content_type) && !text.trim().is_empty() {
        return serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
    }
    Value::String(text.to_string())
}

/// Join base URL, mapped path and query pairs.
///
/// # Errors
///
/// Returns a transport-kind error if the result is not a valid URL.
pub fn build_url(base_url: &str, path: &str, query: &[(String, String)]) -> Result<Url, HttpError> {
    let path = if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let joined = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&joined)
        .map_err(|e| HttpError::transport(format!("Invalid URL '{joined}': {e}")))?;

    if !query.is_empty() {
        let mut qs = url.query().map(str::to_string).unwrap_or_default();
        for (k, v) in query {
            if !qs.is_empty() {
                qs.push('&');
            }
            qs.push_str(&encode_component(k));
            qs.push('=');
            qs.push_str(&encode_component(v));
        }
        url.set_query(Some(&qs));
    }
    Ok(url)
}

/// Merge header layers; later layers win (case-insensitive names).
fn merge_headers(
    defaults: &BTreeMap<String, String>,
    tool: &BTreeMap<String, String>,
    mapped: &[(String, String)],
) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let layers = defaults
        .iter()
        .chain(tool.iter())
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(mapped.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (k, v) in layers {
        out.retain(|(existing, _)| !existing.eq_ignore_ascii_case(k));
        out.push((k.to_string(), v.to_string()));
    }
    out
}

fn apply_auth(auth: &AuthConfig, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match auth {
        AuthConfig::Bearer { token } => request.bearer_auth(token),
        AuthConfig::Header { name, value } => request.header(name, value),
        AuthConfig::Basic { username, password } => request.basic_auth(username, Some(password)),
        AuthConfig::QueryParam { .. } | AuthConfig::None => request,
    }
}
