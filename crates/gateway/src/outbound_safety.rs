use std::collections::HashSet;
use toolgate_http_tools::OutboundHttpSafety;

pub const ALLOW_PRIVATE_NETWORKS_ENV: &str = "TOOLGATE_ALLOW_PRIVATE_NETWORKS";
pub const ALLOWED_HOSTS_ENV: &str = "TOOLGATE_ALLOWED_HOSTS";

fn flag(raw: Option<String>) -> bool {
    matches!(
        raw.unwrap_or_default().trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn csv_set(raw: Option<String>) -> Option<HashSet<String>> {
    let set: HashSet<String> = raw?
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}

/// Outbound HTTP safety policy for the CLI.
///
/// Default is strict (SSRF hardening). For local development/testing you can opt into plain
/// `http://` and private destinations.
///
/// Env:
/// - `TOOLGATE_ALLOW_PRIVATE_NETWORKS=1` allows `http://` and RFC1918/loopback/link-local hosts.
/// - `TOOLGATE_ALLOWED_HOSTS=host1,host2` restricts hosts (case-insensitive).
#[must_use]
pub fn outbound_http_safety() -> OutboundHttpSafety {
    outbound_http_safety_from(|name| std::env::var(name).ok())
}

pub fn outbound_http_safety_from(env: impl Fn(&str) -> Option<String>) -> OutboundHttpSafety {
    let mut safety = OutboundHttpSafety::strict();

    if flag(env(ALLOW_PRIVATE_NETWORKS_ENV)) {
        safety.allow_private_networks = true;
        safety.allow_insecure_http = true;
    }

    if let Some(set) = csv_set(env(ALLOWED_HOSTS_ENV)) {
        safety.allowed_hosts = Some(set);
    }

    safety
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_strict() {
        let safety = outbound_http_safety_from(|_| None);
        assert!(!safety.allow_private_networks);
        assert!(!safety.allow_insecure_http);
        assert!(safety.allowed_hosts.is_none());
        assert!(safety.check_base_url("http://127.0.0.1:8080").is_err());
    }

    #[test]
    fn private_network_flag_and_allowlist() {
        let safety = outbound_http_safety_from(|name| match name {
            ALLOW_PRIVATE_NETWORKS_ENV => Some("yes".to_string()),
            ALLOWED_HOSTS_ENV => Some(" API.example.com, ,127.0.0.1 ".to_string()),
            _ => None,
        });
        assert!(safety.allow_private_networks);
        let hosts = safety.allowed_hosts.clone().expect("allowlist");
        assert!(hosts.contains("api.example.com"));
        assert!(hosts.contains("127.0.0.1"));
        assert_eq!(hosts.len(), 2);
        assert!(safety.check_base_url("http://127.0.0.1:8080").is_ok());
        assert!(safety.check_base_url("https://other.example.com").is_err());
    }

    #[test]
    fn unrecognized_flag_values_are_off() {
        let safety =
            outbound_http_safety_from(|name| (name == ALLOW_PRIVATE_NETWORKS_ENV).then(|| "2".into()));
        assert!(!safety.allow_private_networks);
    }
}
