//! Wiring of one gateway process: store, catalog, token issuer, device
//! notifications, the auth service and its call interceptor.

use crate::auth::{StandaloneVerifier, TokenValidator};
use crate::config::GatewayConfig;
use crate::interceptor::AuthInterceptor;
use crate::notify::WebhookDispatcher;
use crate::token::JwtTokenIssuer;
use anyhow::{Context, Result};
use std::sync::Arc;
use warden_core::{
    AuthService, AuthServiceDeps, Catalog, Clock, NotificationDispatcher, OsSecretSource,
    SqliteStore, SystemClock,
};

#[derive(Clone)]
pub struct Gateway {
    pub service: AuthService,
    pub interceptor: AuthInterceptor,
    pub store: SqliteStore,
    pub catalog: Arc<Catalog>,
}

impl Gateway {
    /// Open the database, load the catalog and assemble the service with
    /// the wall clock and the webhook dispatcher.
    pub fn open(config: &GatewayConfig) -> Result<Self> {
        let notifier = WebhookDispatcher::new(config.notify_timeout)
            .context("failed to build notification client")?;
        Self::open_with(config, Arc::new(SystemClock), Arc::new(notifier))
    }

    pub fn open_with(
        config: &GatewayConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path)
            .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
        let catalog = Arc::new(Catalog::load(&config.catalog_path).with_context(|| {
            format!("failed to load catalog {}", config.catalog_path.display())
        })?);

        let tokens = JwtTokenIssuer::new(
            &config.token_secret,
            config.token_issuer.clone(),
            config.token_ttl,
            clock.clone(),
        );
        let service = AuthService::new(AuthServiceDeps {
            sessions: Arc::new(store.clone()),
            devices: Arc::new(store.clone()),
            apps: catalog.clone(),
            policies: catalog.clone(),
            tokens: Arc::new(tokens),
            notifier,
            clock,
            secrets: Arc::new(OsSecretSource),
            approval: config.approval_config(),
        });

        let validator = TokenValidator::from_config(config.auth.clone())?;
        let verifier = StandaloneVerifier::new(
            validator,
            catalog.clone(),
            config.organization.clone(),
            config.tenant_id.clone(),
        );

        tracing::info!(
            event = "gateway.ready",
            db = %config.db_path.display(),
            apps = catalog.apps.len(),
            policies = catalog.policies.len(),
            jwt = config.auth.jwks_uri.is_some(),
        );

        Ok(Self {
            service,
            interceptor: AuthInterceptor::new(Arc::new(verifier)),
            store,
            catalog,
        })
    }
}
