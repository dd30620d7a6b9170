//! Where an OpenAPI document comes from, and how it is read.

use crate::error::{OpenApiImportError, Result};
use openapiv3::OpenAPI;
use reqwest::Client;
use sha2::{Digest as _, Sha256};
use std::path::PathBuf;
use toolgate_http_tools::OutboundHttpSafety;
use toolgate_http_tools::safety::sanitize_reqwest_error;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    File(PathBuf),
    Url(Url),
    /// The document text itself (JSON or YAML).
    Inline(String),
}

impl SpecSource {
    /// Classify a location string.
    ///
    /// `http(s)://` is a URL, text that looks like a JSON object or an `openapi:` YAML document
    /// is inline, anything else is a file path.
    ///
    /// # Errors
    ///
    /// Returns an error for an unparseable URL.
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim_start();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed).map_err(|e| OpenApiImportError::InvalidLocation {
                location: location.to_string(),
                message: e.to_string(),
            })?;
            return Ok(Self::Url(url));
        }
        if trimmed.starts_with('{') || looks_like_yaml_document(trimmed) {
            return Ok(Self::Inline(location.to_string()));
        }
        Ok(Self::File(PathBuf::from(location)))
    }

    fn describe(&self) -> String {
        match self {
            Self::File(p) => p.display().to_string(),
            Self::Url(u) => u.to_string(),
            Self::Inline(_) => "<inline>".to_string(),
        }
    }

    /// Read the raw document text.
    ///
    /// URL sources are checked against `safety` (including DNS resolution) and capped at its
    /// `max_response_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the fetch is blocked or fails.
    pub async fn read(&self, client: &Client, safety: &OutboundHttpSafety) -> Result<String> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::File(path) => {
                info!(path = %path.display(), "loading OpenAPI spec");
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| OpenApiImportError::SpecReadFile {
                        path: path.display().to_string(),
                        source,
                    })
            }
            Self::Url(url) => {
                info!(url = %toolgate_http_tools::safety::redact_url(url), "fetching OpenAPI spec");
                safety
                    .check_url(url)
                    .await
                    .map_err(OpenApiImportError::FetchBlocked)?;

                let fetch_err = |message: String| OpenApiImportError::SpecFetch {
                    url: url.to_string(),
                    message,
                };
                let resp = client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| fetch_err(sanitize_reqwest_error(&e)))?;
                if !resp.status().is_success() {
                    return Err(fetch_err(format!("status {}", resp.status())));
                }
                let bytes = read_limited(resp, safety.max_response_bytes)
                    .await
                    .map_err(fetch_err)?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| fetch_err(format!("spec is not UTF-8: {e}")))?;
                Ok(text)
            }
        }
    }

    /// Read and parse the document, optionally pinning its content hash.
    ///
    /// `expected_sha256` accepts `sha256:<hex>` or bare hex.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, the hash does not match, or the document is not a
    /// valid OpenAPI 3 document.
    pub async fn load(
        &self,
        client: &Client,
        safety: &OutboundHttpSafety,
        expected_sha256: Option<&str>,
    ) -> Result<OpenAPI> {
        let text = self.read(client, safety).await?;
        if let Some(expected) = expected_sha256 {
            verify_hash(&text, expected)?;
        }
        parse_document(&text, &self.describe())
    }
}

fn looks_like_yaml_document(s: &str) -> bool {
    s.lines()
        .any(|line| line.starts_with("openapi:") || line.starts_with("\"openapi\":"))
}

/// `sha256:<hex>` digest of a document.
#[must_use]
pub fn spec_hash(text: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(text.as_bytes())))
}

fn verify_hash(text: &str, expected: &str) -> Result<()> {
    let actual = spec_hash(text);
    let expected_norm = if expected.starts_with("sha256:") {
        expected.to_ascii_lowercase()
    } else {
        format!("sha256:{}", expected.to_ascii_lowercase())
    };
    if actual != expected_norm {
        warn!(expected = %expected_norm, actual = %actual, "OpenAPI spec hash mismatch");
        return Err(OpenApiImportError::HashMismatch {
            expected: expected_norm,
            actual,
        });
    }
    Ok(())
}

/// Parse JSON or YAML text (JSON is a subset of YAML).
///
/// # Errors
///
/// Returns [`OpenApiImportError::SpecParse`] naming `location`.
pub fn parse_document(text: &str, location: &str) -> Result<OpenAPI> {
    serde_yaml::from_str(text).map_err(|source| OpenApiImportError::SpecParse {
        location: location.to_string(),
        source,
    })
}

/// Read a response body chunk by chunk, stopping as soon as it exceeds `max_bytes`.
async fn read_limited(
    mut resp: reqwest::Response,
    max_bytes: Option<usize>,
) -> std::result::Result<Vec<u8>, String> {
    if let Some(max) = max_bytes
        && let Some(len) = resp.content_length()
        && len > max as u64
    {
        return Err(format!("spec too large: {len} bytes (limit {max})"));
    }
    let mut out = Vec::new();
    while let Some(chunk) = resp.chunk().await.map_err(|e| sanitize_reqwest_error(&e))? {
        if let Some(max) = max_bytes
            && out.len().saturating_add(chunk.len()) > max
        {
            return Err(format!("spec too large: exceeded {max} bytes"));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}
