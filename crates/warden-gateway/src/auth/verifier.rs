//! Identity verification behind the interceptor.
//!
//! [`IdentityVerifier`] is the seam: a hosted IAM client, the standalone
//! verifier below, or a test double. Any error it returns rejects the call.

use super::api_key::hash_api_key;
use super::validation::TokenValidator;
use crate::interceptor::CallContext;
use async_trait::async_trait;
use std::sync::Arc;
use warden_core::{AuthError, Catalog, Principal};

const BEARER_PREFIX: &str = "Bearer ";

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Validate a user JWT (raw `authorization` value) and return the
    /// context augmented with the caller's principal.
    async fn auth_jwt(&self, ctx: CallContext, token: &str) -> Result<CallContext, AuthError>;

    /// Validate an API key. `allowed_for_apps` selects which key scope the
    /// method accepts: app-scoped when true, user-scoped when false.
    async fn auth_api_key(
        &self,
        ctx: CallContext,
        api_key: &str,
        allowed_for_apps: bool,
    ) -> Result<CallContext, AuthError>;
}

/// Self-hosted verifier: JWTs through [`TokenValidator`], API keys through
/// the catalog's digests.
pub struct StandaloneVerifier {
    validator: TokenValidator,
    catalog: Arc<Catalog>,
    organization: String,
    tenant_id: String,
}

impl StandaloneVerifier {
    pub fn new(
        validator: TokenValidator,
        catalog: Arc<Catalog>,
        organization: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            catalog,
            organization: organization.into(),
            tenant_id: tenant_id.into(),
        }
    }

    fn base_principal(&self) -> Principal {
        Principal::default()
            .with_tenant(self.tenant_id.clone())
            .with_organization(self.organization.clone())
    }
}

#[async_trait]
impl IdentityVerifier for StandaloneVerifier {
    async fn auth_jwt(&self, ctx: CallContext, token: &str) -> Result<CallContext, AuthError> {
        let jwt = token
            .strip_prefix(BEARER_PREFIX)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::invalid_credential("authorization value is not a bearer token"))?;

        let claims = self.validator.validate(jwt).await.map_err(|e| {
            tracing::debug!(event = "auth.jwt_rejected", error = %e);
            AuthError::invalid_credential(e.to_string())
        })?;

        let principal = self.base_principal().with_user(claims.user_id());
        Ok(ctx.with_principal(principal))
    }

    async fn auth_api_key(
        &self,
        ctx: CallContext,
        api_key: &str,
        allowed_for_apps: bool,
    ) -> Result<CallContext, AuthError> {
        let entry = self
            .catalog
            .api_key_by_digest(&hash_api_key(api_key))
            .ok_or_else(|| AuthError::invalid_credential("unknown API key"))?;

        let principal = match (entry.is_app_scoped(), allowed_for_apps) {
            (true, true) => self
                .base_principal()
                .with_app(entry.app_id.clone().unwrap_or_default()),
            (false, false) => self
                .base_principal()
                .with_user(entry.user_id.clone().unwrap_or_default()),
            (true, false) => {
                return Err(AuthError::invalid_credential(
                    "app-scoped API key used on a user method",
                ))
            }
            (false, true) => {
                return Err(AuthError::invalid_credential(
                    "user-scoped API key used on an app method",
                ))
            }
        };

        Ok(ctx.with_principal(principal))
    }
}
