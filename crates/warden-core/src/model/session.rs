//! Sessions and the device OTPs that gate human approval.
//!
//! All timestamps are epoch seconds. Expiry checks take `now` explicitly
//! (`*_at` methods) or read it from an injected [`Clock`].

use crate::clock::Clock;
use crate::secrets::SecretSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Total validity window of a device OTP from creation.
pub const SESSION_DEVICE_OTP_DURATION: Duration = Duration::from_secs(60);

/// Grace added to an OTP's expiry to absorb clock and network skew for
/// codes that expire "now".
pub const OTP_DELAY_WINDOW_SECONDS: i64 = 1;

/// Length of the random OTP value sent to the device.
pub const OTP_VALUE_LENGTH: usize = 128;

/// An authorization exchange between an owner app and (optionally) a callee
/// app, tool or user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_app_id: String,
    pub app_id: Option<String>,
    pub tool_name: Option<String>,
    pub user_id: Option<String>,
    /// Set once authorization completes.
    pub access_token: Option<String>,
    pub authorization_code: Option<String>,
    pub created_at: i64,
    /// `None` never expires by time.
    pub expires_at: Option<i64>,
}

impl Session {
    /// Passes when the session is not bound to a tool, or is bound to exactly `name`.
    pub fn validate_tool(&self, name: &str) -> bool {
        match self.tool_name.as_deref() {
            None | Some("") => true,
            Some(tool) => tool == name,
        }
    }

    /// Passes when the session is not bound to an app, or is bound to exactly `app_id`.
    pub fn validate_app(&self, app_id: &str) -> bool {
        self.app_id.as_deref().map_or(true, |id| id == app_id)
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.timestamp())
    }

    pub fn has_expired(&self, clock: &dyn Clock) -> bool {
        self.has_expired_at(clock.now())
    }

    /// Force immediate expiry. Never moves an existing expiry later.
    pub fn expire_at(&mut self, now: DateTime<Utc>) {
        let past = now.timestamp() - 1;
        self.expires_at = Some(match self.expires_at {
            Some(current) if current < past => current,
            _ => past,
        });
    }

    pub fn expire(&mut self, clock: &dyn Clock) {
        self.expire_at(clock.now());
    }

    /// Schedule expiry at `now + after`, overwriting any previous expiry.
    pub fn expire_after_at(&mut self, now: DateTime<Utc>, after: Duration) {
        self.expires_at = Some(now.timestamp() + after.as_secs() as i64);
    }

    pub fn expire_after(&mut self, clock: &dyn Clock, after: Duration) {
        self.expire_after_at(clock.now(), after);
    }
}

/// One-time code bound to a session and a device.
///
/// `approved` is tri-state: `None` pending, `Some(true)` approved,
/// `Some(false)` denied. `used` is independent and must be checked on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDeviceOtp {
    pub id: String,
    pub value: String,
    pub session_id: String,
    pub device_id: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub expires_at: i64,
    pub approved: Option<bool>,
    pub used: bool,
}

impl SessionDeviceOtp {
    pub fn new(
        session_id: impl Into<String>,
        device_id: impl Into<String>,
        clock: &dyn Clock,
        secrets: &dyn SecretSource,
    ) -> Self {
        let now = clock.unix();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            value: secrets.generate(OTP_VALUE_LENGTH),
            session_id: session_id.into(),
            device_id: device_id.into(),
            created_at: now,
            updated_at: None,
            expires_at: now + SESSION_DEVICE_OTP_DURATION.as_secs() as i64,
            approved: None,
            used: false,
        }
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at + OTP_DELAY_WINDOW_SECONDS <= now.timestamp()
    }

    pub fn has_expired(&self, clock: &dyn Clock) -> bool {
        self.has_expired_at(clock.now())
    }

    pub fn is_approved(&self) -> bool {
        self.approved == Some(true)
    }

    pub fn is_denied(&self) -> bool {
        self.approved == Some(false)
    }

    pub fn is_pending(&self) -> bool {
        self.approved.is_none()
    }

    /// Expired and used OTPs are terminal regardless of `approved`.
    pub fn is_consumable_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.has_expired_at(now)
    }
}
