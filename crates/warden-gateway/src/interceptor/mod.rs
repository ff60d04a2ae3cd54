//! Per-call authentication gate.
//!
//! ```text
//! method ──▶ MethodTable ──NoAuth──────────────────────────────▶ handler(ctx)
//!                 │
//!                 └─▶ Credential::extract ──▶ IdentityVerifier ──▶ handler(ctx + principal)
//!                          │                        │
//!                          └──── Unauthenticated ◀──┘
//! ```
//!
//! The verifier runs under the call's deadline; dropping the intercept
//! future drops the in-flight verification with it.

mod metadata;
mod methods;

pub use metadata::{CallContext, Credential, Metadata, AUTHORIZATION_HEADER};
pub use methods::{MethodClass, MethodTable, APP_AUTH_METHODS, NO_AUTH_METHODS};

use crate::auth::IdentityVerifier;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use warden_core::{AuthError, StatusCode};

/// Error returned to the caller at the call boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub reason: &'static str,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.reason, self.message)
    }
}

impl std::error::Error for Status {}

impl From<AuthError> for Status {
    fn from(e: AuthError) -> Self {
        Self::new(e.code(), e.reason_code(), e.public_message())
    }
}

/// Collapse verifier failures into one response shape. Infrastructure and
/// deadline failures keep their own class.
fn authentication_failure(e: AuthError) -> Status {
    match e.code() {
        StatusCode::Internal | StatusCode::DeadlineExceeded => e.into(),
        _ => AuthError::invalid_credential(e.to_string()).into(),
    }
}

#[derive(Clone)]
pub struct AuthInterceptor {
    verifier: Arc<dyn IdentityVerifier>,
    methods: MethodTable,
}

impl AuthInterceptor {
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self::with_methods(verifier, MethodTable::default())
    }

    pub fn with_methods(verifier: Arc<dyn IdentityVerifier>, methods: MethodTable) -> Self {
        Self { verifier, methods }
    }

    /// Authenticate `ctx` for `method`, then run `handler` with the
    /// (possibly augmented) context. The handler's result is returned as is;
    /// on rejection the handler never runs.
    pub async fn intercept<T, F, Fut>(
        &self,
        method: &str,
        ctx: CallContext,
        handler: F,
    ) -> Result<T, Status>
    where
        F: FnOnce(CallContext) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let ctx = self.authenticate(method, ctx).await.map_err(|status| {
            tracing::info!(
                event = "auth.rejected",
                method,
                code = %status.code,
                reason = status.reason,
            );
            status
        })?;
        handler(ctx).await
    }

    pub async fn authenticate(&self, method: &str, ctx: CallContext) -> Result<CallContext, Status> {
        let class = self.methods.classify(method);
        if class == MethodClass::NoAuth {
            return Ok(ctx);
        }

        let metadata = ctx.metadata().ok_or(AuthError::MissingMetadata)?;
        tracing::debug!(event = "auth.metadata", method, metadata = ?metadata.redacted());

        let credential = Credential::extract(metadata).map_err(authentication_failure)?;
        let deadline = ctx.deadline();

        let verify = async {
            match &credential {
                Credential::Bearer(token) => self.verifier.auth_jwt(ctx, token).await,
                Credential::ApiKey(key) => {
                    self.verifier
                        .auth_api_key(ctx, key, class.allows_app_keys())
                        .await
                }
            }
        };

        let verified = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, verify)
                .await
                .unwrap_or(Err(AuthError::DeadlineExceeded)),
            None => verify.await,
        };

        verified.map_err(|e| {
            tracing::debug!(
                event = "auth.verify_failed",
                method,
                credential = credential.kind(),
                error = %e,
            );
            authentication_failure(e)
        })
    }
}
