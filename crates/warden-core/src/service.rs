//! Call-level flows: authorize, token exchange, external authorization and
//! the device's approve/deny callback.
//!
//! `AuthService` owns no state of its own; every mutation goes through the
//! injected stores so several instances can serve the same database.

use crate::approval::{ApprovalConfig, OtpStateMachine};
use crate::clock::Clock;
use crate::errors::{AuthError, SessionField};
use crate::model::{App, Device, Notification, Session, SessionDeviceOtp};
use crate::notify::{ApprovalRequest, NotificationDispatcher};
use crate::policy::PolicyEvaluator;
use crate::principal::Principal;
use crate::secrets::SecretSource;
use crate::store::{AppDirectory, DeviceDirectory, PolicySource, SessionStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of a session between `authorize` and its token exchange.
pub const SESSION_DURATION: Duration = Duration::from_secs(5 * 60);

pub const AUTHORIZATION_CODE_LENGTH: usize = 128;

/// Expiry applied to a session without one on its first successful
/// external authorization.
pub const FIRST_USE_SESSION_TTL: Duration = Duration::from_secs(60);

/// Mints and checks the access tokens handed out by [`AuthService::token`].
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, client_id: &str) -> Result<String, AuthError>;
    /// Signature and expiry check. Failures are `InvalidAccessToken`.
    fn verify(&self, token: &str) -> Result<(), AuthError>;
}

pub struct AuthServiceDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub devices: Arc<dyn DeviceDirectory>,
    pub apps: Arc<dyn AppDirectory>,
    pub policies: Arc<dyn PolicySource>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub secrets: Arc<dyn SecretSource>,
    pub approval: ApprovalConfig,
}

#[derive(Clone)]
pub struct AuthService {
    sessions: Arc<dyn SessionStore>,
    devices: Arc<dyn DeviceDirectory>,
    apps: Arc<dyn AppDirectory>,
    tokens: Arc<dyn TokenIssuer>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    secrets: Arc<dyn SecretSource>,
    evaluator: PolicyEvaluator,
    otps: OtpStateMachine,
}

fn session_lookup_error(e: StoreError) -> AuthError {
    match e {
        StoreError::SessionNotFound => AuthError::SessionNotFound,
        other => other.into(),
    }
}

impl AuthService {
    pub fn new(deps: AuthServiceDeps) -> Self {
        let otps = OtpStateMachine::new(
            deps.sessions.clone(),
            deps.clock.clone(),
            deps.secrets.clone(),
            deps.approval,
        );
        Self {
            evaluator: PolicyEvaluator::new(deps.policies),
            sessions: deps.sessions,
            devices: deps.devices,
            apps: deps.apps,
            tokens: deps.tokens,
            notifier: deps.notifier,
            clock: deps.clock,
            secrets: deps.secrets,
            otps,
        }
    }

    pub fn otps(&self) -> &OtpStateMachine {
        &self.otps
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    fn app(&self, app_id: &str) -> Result<App, AuthError> {
        self.apps.get_app(app_id).map_err(|e| match e {
            StoreError::AppNotFound { app_id } => AuthError::AppNotFound { app_id },
            other => other.into(),
        })
    }

    /// Open a session for the calling app. When `resolver_metadata_id` names
    /// a callee, the policy is evaluated now and the session is bound to it.
    pub fn authorize(
        &self,
        principal: &Principal,
        resolver_metadata_id: Option<&str>,
        tool_name: Option<&str>,
    ) -> Result<Session, AuthError> {
        let caller_id = principal
            .app_id()
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingCallerApp)?;
        self.app(caller_id)?;

        let mut callee_id = None;
        if let Some(resolver_id) = resolver_metadata_id.filter(|id| !id.is_empty()) {
            let callee = self
                .apps
                .get_app_by_resolver_metadata_id(resolver_id)
                .map_err(|e| match e {
                    StoreError::AppNotFound { .. } => AuthError::invalid_request(
                        "auth.calleeAppNotFound",
                        format!("no application found with the resolver metadata ID {resolver_id}"),
                    ),
                    other => other.into(),
                })?;

            if callee.id == caller_id {
                return Err(AuthError::invalid_request(
                    "auth.invalidCalleeApp",
                    "the caller app and the callee app should not be the same",
                ));
            }

            self.evaluator
                .evaluate(&callee, caller_id, tool_name.unwrap_or_default())?;
            callee_id = Some(callee.id);
        }

        let now = self.clock.now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            owner_app_id: caller_id.to_string(),
            app_id: callee_id,
            tool_name: tool_name.map(str::to_string),
            user_id: principal.user_id().map(str::to_string),
            access_token: None,
            authorization_code: Some(self.secrets.generate(AUTHORIZATION_CODE_LENGTH)),
            created_at: now.timestamp(),
            expires_at: Some(now.timestamp() + SESSION_DURATION.as_secs() as i64),
        };
        self.sessions.create_session(&session)?;

        tracing::info!(
            event = "session.created",
            session_id = %session.id,
            owner = %session.owner_app_id,
            callee = ?session.app_id,
            tool = ?session.tool_name,
        );
        Ok(session)
    }

    /// Exchange an authorization code for an access token.
    pub fn token(&self, authorization_code: &str) -> Result<Session, AuthError> {
        if authorization_code.is_empty() {
            return Err(AuthError::invalid_request(
                "auth.emptyAuthCode",
                "authorization code cannot be empty",
            ));
        }

        let mut session = self
            .sessions
            .get_session_by_auth_code(authorization_code)
            .map_err(session_lookup_error)?;

        if session.access_token.is_some() {
            return Err(AuthError::invalid_request(
                "auth.tokenAlreadyIssued",
                "a token has already been issued",
            ));
        }
        if session.has_expired(self.clock.as_ref()) {
            return Err(AuthError::SessionExpired);
        }

        let access_token = self.tokens.issue(&session.owner_app_id)?;

        match self.sessions.get_session_by_access_token(&access_token) {
            Ok(existing) => {
                session.expire(self.clock.as_ref());
                if let Err(e) = self.sessions.update_session(&session) {
                    tracing::error!(
                        event = "session.expire_failed",
                        session_id = %session.id,
                        error = %e,
                    );
                }
                tracing::info!(
                    event = "token.reused",
                    session_id = %existing.id,
                    superseded = %session.id,
                );
                return Ok(existing);
            }
            Err(StoreError::SessionNotFound) => {}
            Err(e) => {
                tracing::error!(event = "token.lookup_failed", error = %e);
                return Err(e.into());
            }
        }

        session.access_token = Some(access_token);
        self.sessions.update_session(&session)?;
        tracing::info!(event = "token.issued", session_id = %session.id);
        Ok(session)
    }

    /// Decide whether the bearer of `access_token` may call `tool_name` on
    /// the app identified by `principal`. Blocks on device approval when the
    /// matching rule requires it.
    pub async fn ext_authz(
        &self,
        principal: &Principal,
        access_token: &str,
        tool_name: &str,
    ) -> Result<(), AuthError> {
        if access_token.is_empty() {
            return Err(AuthError::invalid_request(
                "auth.emptyAccessToken",
                "access token cannot be empty",
            ));
        }

        let mut session = self
            .sessions
            .get_session_by_access_token(access_token)
            .map_err(session_lookup_error)?;
        if session.has_expired(self.clock.as_ref()) {
            return Err(AuthError::SessionExpired);
        }

        let callee_id = principal.app_id().unwrap_or_default();
        let callee = self.app(callee_id)?;

        if !session.validate_app(callee_id) {
            return Err(AuthError::SessionMismatch {
                field: SessionField::App,
            });
        }
        if !session.validate_tool(tool_name) {
            return Err(AuthError::SessionMismatch {
                field: SessionField::Tool,
            });
        }

        let caller = self.app(&session.owner_app_id)?;

        if let Err(e) = self.tokens.verify(access_token) {
            tracing::warn!(event = "ext_authz.token_rejected", session_id = %session.id, error = %e);
            return Err(match e {
                AuthError::InvalidAccessToken { .. } => e,
                other => AuthError::InvalidAccessToken {
                    reason: other.to_string(),
                },
            });
        }

        let rule = self
            .evaluator
            .evaluate(&callee, &session.owner_app_id, tool_name)?;

        if rule.needs_approval {
            let otp = self
                .request_approval(&session, &caller, &callee, tool_name)
                .await?;
            self.otps.wait_for_approval(&otp).await?;
        }

        if session.expires_at.is_none() {
            session.expire_after(self.clock.as_ref(), FIRST_USE_SESSION_TTL);
            self.sessions.update_session(&session)?;
        }

        tracing::info!(
            event = "ext_authz.allow",
            session_id = %session.id,
            caller = %caller.id,
            callee = %callee.id,
            rule_id = %rule.id,
        );
        Ok(())
    }

    /// Issue an OTP to the user's most recently registered device and push
    /// the approval request. A failed push leaves the OTP in place.
    pub async fn request_approval(
        &self,
        session: &Session,
        caller: &App,
        callee: &App,
        tool_name: &str,
    ) -> Result<SessionDeviceOtp, AuthError> {
        let devices = self.devices.devices_for_user(session.user_id.as_deref())?;
        let device = devices.last().ok_or(AuthError::NoDevicesRegistered)?;

        let otp = self.otps.issue(&session.id, &device.id)?;
        let notification = Notification::approval_request(ApprovalRequest {
            caller_app: caller.display_name(),
            callee_app: Some(callee.display_name()),
            tool_name: Some(tool_name),
            otp: &otp.value,
            device_id: &device.id,
            session_id: &session.id,
            timeout_in_seconds: self.otps.config().window.as_secs(),
        });

        self.notifier
            .send(&device.subscription_token, &notification)
            .await
            .map_err(|e| {
                tracing::error!(
                    event = "notify.approval_failed",
                    device_id = %device.id,
                    otp_id = %otp.id,
                    error = %e,
                );
                AuthError::from(e)
            })?;

        Ok(otp)
    }

    /// The device's answer to an approval request.
    pub fn approve_token(
        &self,
        device_id: &str,
        session_id: &str,
        otp_value: &str,
        approve: bool,
    ) -> Result<(), AuthError> {
        self.otps
            .respond(device_id, session_id, otp_value, approve)
            .map(|_| ())
    }

    /// Force a session past its expiry.
    pub fn expire_session(&self, session_id: &str) -> Result<Session, AuthError> {
        let mut session = self
            .sessions
            .get_session(session_id)
            .map_err(session_lookup_error)?;
        session.expire(self.clock.as_ref());
        self.sessions.update_session(&session)?;
        tracing::info!(event = "session.expired", session_id = %session.id);
        Ok(session)
    }

    /// Persist a paired device and confirm the pairing on it. A failed
    /// confirmation does not undo the registration.
    pub async fn register_device(&self, mut device: Device) -> Result<Device, AuthError> {
        if device.id.is_empty() {
            device.id = uuid::Uuid::new_v4().to_string();
        }
        if device.subscription_token.is_empty() {
            return Err(AuthError::invalid_request(
                "device.emptySubscriptionToken",
                "subscription token cannot be empty",
            ));
        }
        device.created_at = self.clock.now();
        self.devices.register_device(&device)?;
        tracing::info!(event = "device.registered", device_id = %device.id, user_id = %device.user_id);

        if let Err(e) = self
            .notifier
            .send(&device.subscription_token, &Notification::device_registered())
            .await
        {
            tracing::warn!(event = "notify.device_registered_failed", device_id = %device.id, error = %e);
        }
        Ok(device)
    }

    /// Push an informational message to every device of `user_id`.
    /// Returns how many devices accepted it.
    pub async fn send_info(&self, user_id: &str, body: &str) -> Result<usize, AuthError> {
        let devices = self.devices.devices_for_user(Some(user_id))?;
        if devices.is_empty() {
            return Err(AuthError::NoDevicesRegistered);
        }

        let notification = Notification::info(body);
        let mut delivered = 0;
        let mut last_error = None;
        for device in &devices {
            match self
                .notifier
                .send(&device.subscription_token, &notification)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(event = "notify.info_failed", device_id = %device.id, error = %e);
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(e.into()),
            (n, _) => Ok(n),
        }
    }
}
