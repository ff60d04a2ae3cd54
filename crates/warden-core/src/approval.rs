//! Device OTP state machine.
//!
//! ```text
//! pending ──respond(true)──▶ approved ──consume──▶ used
//!    │                                              ▲
//!    └──────respond(false)─▶ denied ───consume──────┘
//! ```
//!
//! Expired and used OTPs are terminal. The pending → approved/denied step is
//! committed by a conditional store update; losing that race means another
//! writer already resolved the OTP, so the state is re-read and reported
//! instead of retried.

use crate::clock::Clock;
use crate::errors::AuthError;
use crate::model::{SessionDeviceOtp, OTP_DELAY_WINDOW_SECONDS, SESSION_DEVICE_OTP_DURATION};
use crate::secrets::SecretSource;
use crate::store::{SessionStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Tunables for the approval wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalConfig {
    /// Delay between two store reads while waiting for the device.
    pub poll_interval: Duration,
    /// Upper bound on the wait, never longer than the OTP validity.
    pub window: Duration,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            window: SESSION_DEVICE_OTP_DURATION,
        }
    }
}

impl ApprovalConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window.min(SESSION_DEVICE_OTP_DURATION);
        self
    }
}

/// Observable state of one OTP at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpStatus {
    Pending,
    Approved,
    Denied,
    Expired,
    Used,
}

impl OtpStatus {
    pub fn of(otp: &SessionDeviceOtp, clock: &dyn Clock) -> Self {
        if otp.used {
            Self::Used
        } else if otp.has_expired(clock) {
            Self::Expired
        } else if otp.is_approved() {
            Self::Approved
        } else if otp.is_denied() {
            Self::Denied
        } else {
            Self::Pending
        }
    }
}

#[derive(Clone)]
pub struct OtpStateMachine {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    secrets: Arc<dyn SecretSource>,
    config: ApprovalConfig,
}

fn otp_lookup_error(e: StoreError) -> AuthError {
    match e {
        StoreError::DeviceOtpNotFound => AuthError::OtpNotFound,
        other => other.into(),
    }
}

impl OtpStateMachine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        secrets: Arc<dyn SecretSource>,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            store,
            clock,
            secrets,
            config,
        }
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    /// Create and persist a pending OTP for `(session_id, device_id)`.
    pub fn issue(&self, session_id: &str, device_id: &str) -> Result<SessionDeviceOtp, AuthError> {
        let otp =
            SessionDeviceOtp::new(session_id, device_id, self.clock.as_ref(), self.secrets.as_ref());
        self.store.create_device_otp(&otp)?;
        tracing::info!(
            event = "otp.issued",
            otp_id = %otp.id,
            session_id = %session_id,
            device_id = %device_id,
            expires_at = otp.expires_at,
        );
        Ok(otp)
    }

    /// Record the device's answer. Only the first answer to a pending,
    /// unexpired, unused OTP is committed.
    pub fn respond(
        &self,
        device_id: &str,
        session_id: &str,
        value: &str,
        approve: bool,
    ) -> Result<SessionDeviceOtp, AuthError> {
        let otp = self
            .store
            .get_device_otp_by_value(device_id, session_id, value)
            .map_err(otp_lookup_error)?;

        match OtpStatus::of(&otp, self.clock.as_ref()) {
            OtpStatus::Expired => return Err(AuthError::OtpExpired),
            OtpStatus::Pending => {}
            _ => return Err(AuthError::OtpAlreadyUsed),
        }

        let now = self.clock.unix();
        if !self.store.resolve_device_otp(&otp.id, approve, now)? {
            let current = self.store.get_device_otp(&otp.id).map_err(otp_lookup_error)?;
            tracing::warn!(
                event = "otp.resolve_conflict",
                otp_id = %otp.id,
                approved = ?current.approved,
                used = current.used,
            );
            if OtpStatus::of(&current, self.clock.as_ref()) == OtpStatus::Expired {
                return Err(AuthError::OtpExpired);
            }
            return Err(AuthError::OtpAlreadyUsed);
        }

        tracing::info!(event = "otp.resolved", otp_id = %otp.id, approved = approve);
        Ok(SessionDeviceOtp {
            approved: Some(approve),
            updated_at: Some(now),
            ..otp
        })
    }

    pub fn check(&self, otp_id: &str) -> Result<OtpStatus, AuthError> {
        let otp = self.store.get_device_otp(otp_id).map_err(otp_lookup_error)?;
        Ok(OtpStatus::of(&otp, self.clock.as_ref()))
    }

    /// Flag the OTP as used. Fails when someone else consumed it first.
    pub fn consume(&self, otp_id: &str) -> Result<(), AuthError> {
        if self.store.mark_device_otp_used(otp_id, self.clock.unix())? {
            Ok(())
        } else {
            Err(AuthError::OtpAlreadyUsed)
        }
    }

    /// Block until the device answers, the OTP expires or the window elapses.
    ///
    /// The OTP is consumed afterwards whatever the outcome. Dropping the
    /// returned future stops polling.
    pub async fn wait_for_approval(&self, otp: &SessionDeviceOtp) -> Result<(), AuthError> {
        let remaining = (otp.expires_at + OTP_DELAY_WINDOW_SECONDS - self.clock.unix()).max(0);
        let bound = self
            .config
            .window
            .min(Duration::from_secs(remaining as u64));

        let outcome = match tokio::time::timeout(bound, self.poll(&otp.id)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::ApprovalTimeout {
                waited_secs: bound.as_secs(),
            }),
        };

        if let Err(e) = &outcome {
            tracing::info!(
                event = "otp.wait_failed",
                otp_id = %otp.id,
                reason = e.reason_code(),
            );
        }

        match self.consume(&otp.id) {
            Ok(()) => outcome,
            Err(AuthError::OtpAlreadyUsed) if outcome.is_ok() => {
                tracing::warn!(event = "otp.consume_conflict", otp_id = %otp.id);
                Err(AuthError::OtpAlreadyUsed)
            }
            Err(AuthError::OtpAlreadyUsed) => outcome,
            Err(e) => {
                tracing::error!(event = "otp.consume_failed", otp_id = %otp.id, error = %e);
                outcome.and(Err(e))
            }
        }
    }

    async fn poll(&self, otp_id: &str) -> Result<(), AuthError> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.check(otp_id)? {
                OtpStatus::Pending => continue,
                OtpStatus::Approved => return Ok(()),
                OtpStatus::Denied => return Err(AuthError::OtpDenied),
                OtpStatus::Expired => return Err(AuthError::OtpExpired),
                OtpStatus::Used => return Err(AuthError::OtpAlreadyUsed),
            }
        }
    }
}
