use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Log header anomalies (typ, crit, unexpected alg) but keep validating.
    Permissive,
    /// Reject any anomaly with a hard error.
    #[default]
    Strict,
}

/// JWT validation settings for the user-credential path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub jwks_uri: Option<Url>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub clock_skew_leeway: Duration,
    /// Permit JWKS hosts on loopback/private ranges (local IdPs, tests).
    pub allow_private_jwks: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            jwks_uri: None,
            issuer: None,
            audience: Vec::new(),
            clock_skew_leeway: Duration::from_secs(30),
            allow_private_jwks: false,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = env::var("WARDEN_AUTH_MODE") {
            cfg.mode = match v.to_lowercase().as_str() {
                "permissive" => AuthMode::Permissive,
                _ => AuthMode::Strict,
            };
        }

        if let Ok(v) = env::var("WARDEN_AUTH_ALLOW_PRIVATE_JWKS") {
            cfg.allow_private_jwks = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(v) = env::var("WARDEN_AUTH_JWKS_URI") {
            match Url::parse(&v) {
                Ok(u) if u.scheme() == "https" => cfg.jwks_uri = Some(u),
                Ok(u) if cfg.mode == AuthMode::Strict => {
                    // An unsafe URI leaves JWT auth unconfigured rather than insecure.
                    tracing::error!(
                        event = "config.jwks_rejected",
                        uri = %u,
                        "JWKS URI must be HTTPS in strict mode; ignoring it"
                    );
                }
                Ok(u) => {
                    tracing::warn!(event = "config.jwks_insecure", uri = %u, "JWKS URI is not HTTPS");
                    cfg.jwks_uri = Some(u);
                }
                Err(e) => {
                    tracing::error!(event = "config.jwks_invalid", error = %e, "unparseable JWKS URI");
                }
            }
        }

        if let Ok(v) = env::var("WARDEN_AUTH_ISSUER") {
            cfg.issuer = Some(v).filter(|s| !s.is_empty());
        }

        if let Ok(v) = env::var("WARDEN_AUTH_AUDIENCE") {
            cfg.audience = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(secs) = env::var("WARDEN_AUTH_LEEWAY_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            cfg.clock_skew_leeway = Duration::from_secs(secs);
        }

        cfg
    }
}
