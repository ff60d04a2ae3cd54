use crate::auth::AuthConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use warden_core::ApprovalConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub db_path: PathBuf,
    pub catalog_path: PathBuf,
    pub organization: String,
    pub tenant_id: String,
    pub token_secret: Vec<u8>,
    pub token_issuer: String,
    pub token_ttl: Duration,
    pub otp_poll_interval: Duration,
    pub notify_timeout: Duration,
    pub auth: AuthConfig,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: v }),
        _ => Ok(default),
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token_secret = env::var("WARDEN_TOKEN_SECRET")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("WARDEN_TOKEN_SECRET"))?;

        let token_ttl = parse_u64("WARDEN_TOKEN_TTL_SECS", 3600)?;
        if token_ttl == 0 {
            return Err(ConfigError::Invalid {
                name: "WARDEN_TOKEN_TTL_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            db_path: var_or("WARDEN_DB_PATH", "warden.db").into(),
            catalog_path: var_or("WARDEN_CATALOG", "warden.yaml").into(),
            organization: env::var("WARDEN_ORGANIZATION").unwrap_or_default(),
            tenant_id: var_or("WARDEN_TENANT_ID", "standalone"),
            token_secret: token_secret.into_bytes(),
            token_issuer: var_or("WARDEN_TOKEN_ISSUER", "warden"),
            token_ttl: Duration::from_secs(token_ttl),
            otp_poll_interval: Duration::from_millis(parse_u64("WARDEN_OTP_POLL_MS", 500)?),
            notify_timeout: Duration::from_secs(parse_u64("WARDEN_NOTIFY_TIMEOUT_SECS", 10)?),
            auth: AuthConfig::from_env(),
        })
    }

    pub fn approval_config(&self) -> ApprovalConfig {
        ApprovalConfig::default().with_poll_interval(self.otp_poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "WARDEN_DB_PATH",
        "WARDEN_CATALOG",
        "WARDEN_ORGANIZATION",
        "WARDEN_TENANT_ID",
        "WARDEN_TOKEN_SECRET",
        "WARDEN_TOKEN_ISSUER",
        "WARDEN_TOKEN_TTL_SECS",
        "WARDEN_OTP_POLL_MS",
        "WARDEN_NOTIFY_TIMEOUT_SECS",
    ];

    fn clear() {
        for key in VARS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn secret_is_required() {
        clear();
        let err = GatewayConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("WARDEN_TOKEN_SECRET")));
    }

    #[test]
    #[serial]
    fn defaults() {
        clear();
        env::set_var("WARDEN_TOKEN_SECRET", "s3cret");
        let cfg = GatewayConfig::from_env().unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("warden.db"));
        assert_eq!(cfg.catalog_path, PathBuf::from("warden.yaml"));
        assert_eq!(cfg.tenant_id, "standalone");
        assert_eq!(cfg.token_issuer, "warden");
        assert_eq!(cfg.token_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.approval_config().poll_interval, Duration::from_millis(500));
        clear();
    }

    #[test]
    #[serial]
    fn overrides_and_bad_numbers() {
        clear();
        env::set_var("WARDEN_TOKEN_SECRET", "s3cret");
        env::set_var("WARDEN_OTP_POLL_MS", "50");
        env::set_var("WARDEN_TENANT_ID", "acme-prod");
        let cfg = GatewayConfig::from_env().unwrap();
        assert_eq!(cfg.otp_poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.tenant_id, "acme-prod");

        env::set_var("WARDEN_TOKEN_TTL_SECS", "soon");
        assert!(matches!(
            GatewayConfig::from_env(),
            Err(ConfigError::Invalid {
                name: "WARDEN_TOKEN_TTL_SECS",
                ..
            })
        ));
        clear();
    }
}
