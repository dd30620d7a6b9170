//! Outbound HTTP safety controls (SSRF protection, limits, redaction).
//!
//! The same policy object is consulted twice:
//! - at validation time, against each configured `baseUrl` (scheme + literal host rules)
//! - at request time, against the final URL including DNS resolution

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::net::lookup_host;
use url::{Host, Url};

const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "localhost.localdomain"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Do not follow redirects.
    None,
    /// Follow redirects (reqwest default policy).
    Follow,
}

#[derive(Debug, Clone)]
pub struct OutboundHttpSafety {
    /// If true, `http://` base URLs are accepted.
    pub allow_insecure_http: bool,
    /// If true, allow private/loopback/link-local destinations.
    pub allow_private_networks: bool,
    /// If set, only these hosts are allowed (case-insensitive).
    pub allowed_hosts: Option<HashSet<String>>,
    /// Maximum raw response body size (bytes). `None` = unlimited.
    pub max_response_bytes: Option<usize>,
    pub redirects: RedirectPolicy,
}

impl Default for OutboundHttpSafety {
    fn default() -> Self {
        Self::strict()
    }
}

impl OutboundHttpSafety {
    /// Production policy: `https` only, no loopback/private destinations, no redirects.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            allow_insecure_http: false,
            allow_private_networks: false,
            allowed_hosts: None,
            max_response_bytes: Some(8 * 1024 * 1024), // 8 MiB
            redirects: RedirectPolicy::None,
        }
    }

    /// Local development / test policy. Never enabled implicitly.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allow_insecure_http: true,
            allow_private_networks: true,
            allowed_hosts: None,
            max_response_bytes: None,
            redirects: RedirectPolicy::Follow,
        }
    }

    /// Check a configured base URL without touching the network.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the URL is unparseable, uses a disallowed scheme, or
    /// names a loopback/private host.
    pub fn check_base_url(&self, raw: &str) -> Result<(), String> {
        let url = Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;
        match url.scheme() {
            "https" => {}
            "http" if self.allow_insecure_http => {}
            other => return Err(format!("scheme '{other}' is not allowed (https required)")),
        }

        let Some(host) = url.host() else {
            return Err("missing host".to_string());
        };
        self.check_allowlist(&host_display(&host))?;

        if self.allow_private_networks {
            return Ok(());
        }

        match host {
            Host::Domain(d) => {
                let d = d.trim_end_matches('.').to_ascii_lowercase();
                if BLOCKED_HOSTNAMES.contains(&d.as_str()) {
                    return Err(format!("host '{d}' is a loopback name"));
                }
                Ok(())
            }
            Host::Ipv4(ip) => check_ip(IpAddr::V4(ip)),
            Host::Ipv6(ip) => check_ip(IpAddr::V6(ip)),
        }
    }

    /// Validate a request URL right before it is sent, resolving the hostname.
    ///
    /// # Errors
    ///
    /// Returns a reason if the URL is disallowed by the policy or DNS resolution fails.
    pub async fn check_url(&self, url: &Url) -> Result<(), String> {
        self.check_base_url(url.as_str())?;
        if self.allow_private_networks {
            return Ok(());
        }

        let Some(Host::Domain(host)) = url.host() else {
            // IP literals were already checked above.
            return Ok(());
        };
        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| format!("DNS lookup failed for host '{host}': {e}"))?;

        let mut saw_any = false;
        for addr in addrs {
            saw_any = true;
            check_ip(addr.ip()).map_err(|reason| format!("host '{host}' resolved to {reason}"))?;
        }
        if !saw_any {
            return Err(format!("DNS lookup returned no addresses for host '{host}'"));
        }
        Ok(())
    }

    fn check_allowlist(&self, host: &str) -> Result<(), String> {
        if let Some(allowed) = &self.allowed_hosts
            && !allowed.contains(&host.to_ascii_lowercase())
        {
            return Err(format!("host '{host}' is not in the allowlist"));
        }
        Ok(())
    }
}

fn host_display(host: &Host<&str>) -> String {
    match host {
        Host::Domain(d) => (*d).to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    }
}

fn check_ip(ip: IpAddr) -> Result<(), String> {
    let denied = match ip {
        IpAddr::V4(v4) => is_denied_ipv4(v4),
        IpAddr::V6(v6) => is_denied_ipv6(v6),
    };
    if denied {
        Err(format!("disallowed address '{ip}'"))
    } else {
        Ok(())
    }
}

fn is_denied_ipv4(ip: Ipv4Addr) -> bool {
    // loopback, RFC 1918, link-local (cloud metadata), unspecified, broadcast
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn is_denied_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_denied_ipv4(v4);
    }
    ip.is_loopback() || ip.is_unspecified() || ip.is_unique_local() || ip.is_unicast_link_local()
}

/// Strip credentials, query and fragment from a URL before it is logged.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Whether a header name carries credentials.
#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    let n = name.trim().to_ascii_lowercase();
    matches!(
        n.as_str(),
        "authorization" | "proxy-authorization" | "cookie" | "set-cookie"
    ) || n.contains("token")
        || n.contains("secret")
        || n.contains("api-key")
        || n.contains("apikey")
        || n.contains("api_key")
        || n.ends_with("-key")
}

/// Copy of `headers` with credential-bearing values masked.
///
/// `extra` names an additional header to mask (the configured auth header).
#[must_use]
pub fn redact_headers(headers: &[(String, String)], extra: Option<&str>) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(k, v)| {
            let masked = is_sensitive_header(k) || extra.is_some_and(|e| e.eq_ignore_ascii_case(k));
            if masked {
                (k.clone(), "***REDACTED***".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}
