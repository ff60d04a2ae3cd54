//! Credential-bearing metadata keys.
//!
//! Inbound credentials must never reach a log line or an outbound request.
//! Call metadata goes through [`redact_metadata`] before it is logged, and
//! outbound requests (JWKS fetch, webhook delivery) are built from
//! [`build_downstream_headers`] only.

use std::collections::HashSet;
use std::sync::OnceLock;

/// API key metadata key checked by the interceptor.
pub const API_KEY_HEADER: &str = "x-id-api-key";

/// Compared case-insensitively.
pub const SENSITIVE_HEADER_NAMES: &[&str] = &[
    "authorization",
    API_KEY_HEADER,
    "x-api-key",
    "proxy-authorization",
    "cookie",
    "cookie2",
    "set-cookie",
    "x-auth-token",
    "x-access-token",
    "x-forwarded-authorization",
];

pub const REDACTED: &str = "[redacted]";

fn sensitive_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| SENSITIVE_HEADER_NAMES.iter().copied().collect())
}

#[inline]
pub fn is_sensitive(name: &str) -> bool {
    sensitive_set().contains(name.to_ascii_lowercase().as_str())
}

/// Keep every key but mask sensitive values, for logging.
pub fn redact_metadata<K, V>(headers: &[(K, V)]) -> Vec<(String, String)>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .iter()
        .map(|(k, v)| {
            let value = if is_sensitive(k.as_ref()) {
                REDACTED
            } else {
                v.as_ref()
            };
            (k.as_ref().to_string(), value.to_string())
        })
        .collect()
}

/// Headers for an outbound request, built from an allowlist.
///
/// `content-type` is left to the body encoder so it is sent exactly once.
#[inline]
pub fn build_downstream_headers() -> Vec<(&'static str, String)> {
    vec![("accept", "application/json".to_string())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_sensitive_case_insensitive() {
        assert!(is_sensitive("Authorization"));
        assert!(is_sensitive("AUTHORIZATION"));
        assert!(is_sensitive("X-Id-Api-Key"));
        assert!(is_sensitive("Cookie"));
        assert!(!is_sensitive("content-type"));
        assert!(!is_sensitive("x-request-id"));
    }

    #[test]
    fn redaction_masks_values_only() {
        let headers = [("authorization", "Bearer secret"), ("user-agent", "agent/1.0")];
        let out = redact_metadata(&headers);
        assert_eq!(out[0], ("authorization".to_string(), REDACTED.to_string()));
        assert_eq!(out[1].1, "agent/1.0");
        assert!(!format!("{out:?}").contains("secret"));
    }

    #[test]
    fn downstream_headers_leave_content_type_to_the_body() {
        assert!(build_downstream_headers()
            .iter()
            .all(|(name, _)| !name.eq_ignore_ascii_case("content-type")));
    }

    #[test]
    fn downstream_headers_carry_no_credentials() {
        assert!(build_downstream_headers()
            .iter()
            .all(|(name, _)| !is_sensitive(name)));
    }
}
