use super::config::{AuthConfig, AuthMode};
use super::jwks::JwksProvider;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header parameters that let a token pick its own verification key.
const DANGEROUS_HEADERS: &[&str] = &["jku", "jwk", "x5u", "x5c"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    pub iss: Option<String>,
    pub aud: Option<serde_json::Value>,
    pub exp: u64,
    pub nbf: Option<u64>,
    pub iat: Option<u64>,
}

impl Claims {
    /// Identifier placed in the principal: `username` when the IdP sends
    /// one, `sub` otherwise.
    pub fn user_id(&self) -> &str {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.sub)
    }
}

/// Validates user JWTs: header discipline first, then signature and claims.
pub struct TokenValidator {
    config: AuthConfig,
    jwks: Option<JwksProvider>,
    static_key: Option<Arc<DecodingKey>>,
}

impl TokenValidator {
    pub fn new(config: AuthConfig, jwks: Option<JwksProvider>) -> Self {
        Self {
            config,
            jwks,
            static_key: None,
        }
    }

    /// Build the JWKS provider from `config.jwks_uri`, when set.
    pub fn from_config(config: AuthConfig) -> Result<Self> {
        let jwks = match &config.jwks_uri {
            Some(uri) if config.allow_private_jwks => {
                Some(JwksProvider::new_allow_private(uri.clone())?)
            }
            Some(uri) => Some(JwksProvider::new(uri.clone())?),
            None => None,
        };
        Ok(Self::new(config, jwks))
    }

    /// Validator pinned to a single RSA public key (PEM).
    pub fn with_static_key(config: AuthConfig, key_pem: &[u8]) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to create DecodingKey from RSA PEM: {e}"))?;
        Ok(Self {
            config,
            jwks: None,
            static_key: Some(Arc::new(key)),
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn reject_or_warn(&self, reason: &'static str, msg: String) -> Result<()> {
        if self.config.mode == AuthMode::Strict {
            return Err(anyhow::anyhow!(msg));
        }
        tracing::warn!(reason, "{}", msg);
        Ok(())
    }

    pub async fn validate(&self, token: &str) -> Result<Claims> {
        // Raw header first: `crit` and key-selection headers are dropped by
        // the typed header.
        let mut parts = token.split('.');
        let (Some(raw_header), Some(_), Some(_), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            anyhow::bail!("Invalid JWT format");
        };
        let header_json = URL_SAFE_NO_PAD
            .decode(raw_header)
            .context("Failed to decode JWT header base64")?;
        let header_value: serde_json::Value =
            serde_json::from_slice(&header_json).context("Failed to parse JWT header JSON")?;

        if let Some(obj) = header_value.as_object() {
            if let Some(crit) = obj.get("crit") {
                self.reject_or_warn(
                    "W_AUTH_CRIT",
                    format!("Token contains critical extensions ({crit}) which are not understood"),
                )?;
            }
            if DANGEROUS_HEADERS.iter().any(|h| obj.contains_key(*h)) {
                self.reject_or_warn(
                    "W_AUTH_HEADER",
                    "Token contains dangerous headers (jku, jwk, x5u, x5c)".to_string(),
                )?;
            }
        }

        let header = decode_header(token).context("Failed to decode JWT header")?;

        if !matches!(header.alg, Algorithm::RS256 | Algorithm::ES256) {
            // Never verified with a shared secret, whatever the mode.
            anyhow::bail!("Algorithm {:?} not allowed (only RS256, ES256)", header.alg);
        }

        match header.typ.as_deref().map(str::to_lowercase) {
            Some(t) if matches!(t.as_str(), "jwt" | "at+jwt" | "application/at+jwt") => {}
            Some(_) => self.reject_or_warn(
                "W_AUTH_TYP",
                format!(
                    "Token type '{}' not accepted",
                    header.typ.as_deref().unwrap_or_default()
                ),
            )?,
            None => self.reject_or_warn("W_AUTH_TYP", "Missing 'typ' header".to_string())?,
        }

        let key = match (&self.static_key, &self.jwks, &header.kid) {
            (Some(key), _, _) => key.clone(),
            (None, Some(provider), Some(kid)) => provider
                .get_key(kid)
                .await
                .context("Unable to resolve signing key")?,
            (None, Some(_), None) => anyhow::bail!("Token has no 'kid' to select a signing key"),
            (None, None, _) => anyhow::bail!("Auth not configured (missing JWKS URI)"),
        };

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.config.clock_skew_leeway.as_secs();
        if let Some(iss) = &self.config.issuer {
            validation.set_issuer(&[iss]);
        }
        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.config.audience);
        }

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| anyhow::anyhow!("JWT validation failed: {e}"))?;
        Ok(data.claims)
    }
}
