//! Signing keys fetched from the identity provider's JWKS endpoint.
//!
//! Keys are cached by `kid`; a miss triggers one refresh of the whole set.
//! Outbound requests carry no request-derived headers and never follow
//! redirects.

use anyhow::{Context, Result};
use jsonwebtoken::DecodingKey;
use moka::sync::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const MAX_KEYS: u64 = 100;
const MAX_JWKS_BYTES: u64 = 512 * 1024;

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    #[serde(rename = "use")]
    key_use: Option<String>,
    // RSA
    n: Option<String>,
    e: Option<String>,
    // EC
    x: Option<String>,
    y: Option<String>,
}

impl Jwk {
    fn decoding_key(&self) -> Option<DecodingKey> {
        if self.key_use.as_deref().is_some_and(|u| u != "sig") {
            return None;
        }
        match self.kty.as_str() {
            "RSA" => {
                let (n, e) = (self.n.as_deref()?, self.e.as_deref()?);
                DecodingKey::from_rsa_components(n, e).ok()
            }
            "EC" => {
                let (x, y) = (self.x.as_deref()?, self.y.as_deref()?);
                DecodingKey::from_ec_components(x, y).ok()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Clone)]
pub struct JwksProvider {
    cache: Cache<String, Arc<DecodingKey>>,
    client: Client,
    jwks_uri: Url,
}

impl JwksProvider {
    /// Provider for a public JWKS endpoint. Loopback, private and
    /// link-local addresses are refused.
    pub fn new(jwks_uri: Url) -> Result<Self> {
        Self::build(jwks_uri, false)
    }

    /// Provider that also accepts private-network hosts.
    pub fn new_allow_private(jwks_uri: Url) -> Result<Self> {
        Self::build(jwks_uri, true)
    }

    fn build(jwks_uri: Url, allow_private: bool) -> Result<Self> {
        if !allow_private {
            Self::validate_uri(&jwks_uri)?;
        }

        Ok(Self {
            cache: Cache::builder()
                .max_capacity(MAX_KEYS)
                .time_to_live(Duration::from_secs(3600))
                .build(),
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .user_agent(concat!("warden-gateway/", env!("CARGO_PKG_VERSION")))
                .redirect(reqwest::redirect::Policy::none())
                .build()?,
            jwks_uri,
        })
    }

    fn validate_uri(uri: &Url) -> Result<()> {
        let ip = match uri.host() {
            Some(url::Host::Ipv4(addr)) => IpAddr::V4(addr),
            Some(url::Host::Ipv6(addr)) => IpAddr::V6(addr),
            Some(url::Host::Domain(_)) => return Ok(()),
            None => anyhow::bail!("JWKS URI has no host: {uri}"),
        };
        if is_unsafe_ip(&ip) {
            anyhow::bail!("Use of unsafe IP address in JWKS URI: {ip}");
        }
        Ok(())
    }

    pub async fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        if let Some(key) = self.cache.get(kid) {
            return Ok(key);
        }

        self.refresh().await?;

        self.cache
            .get(kid)
            .ok_or_else(|| anyhow::anyhow!("Public key not found for kid: {kid}"))
    }

    async fn refresh(&self) -> Result<()> {
        tracing::info!(event = "jwks.refresh", uri = %self.jwks_uri);
        let resp = self
            .client
            .get(self.jwks_uri.clone())
            .send()
            .await?
            .error_for_status()
            .context("JWKS endpoint returned an error status")?;

        if resp.content_length().is_some_and(|len| len > MAX_JWKS_BYTES) {
            anyhow::bail!("JWKS response too large");
        }

        let jwks: JwksResponse = resp.json().await.context("Failed to parse JWKS")?;

        let mut loaded = 0usize;
        for jwk in &jwks.keys {
            let (Some(kid), Some(key)) = (&jwk.kid, jwk.decoding_key()) else {
                continue;
            };
            self.cache.insert(kid.clone(), Arc::new(key));
            loaded += 1;
        }
        tracing::debug!(event = "jwks.loaded", keys = loaded, offered = jwks.keys.len());
        Ok(())
    }
}

fn is_unsafe_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_loopback()
                || addr.is_link_local()
                || addr.is_multicast()
                || addr.is_unspecified()
                || addr.is_private()
        }
        IpAddr::V6(addr) => {
            addr.is_loopback()
                || addr.is_multicast()
                || addr.is_unspecified()
                || (addr.segments()[0] & 0xfe00) == 0xfc00
                || (addr.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}
