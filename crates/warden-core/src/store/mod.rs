//! Store contracts consumed by the core, and the SQLite implementation.
//!
//! OTP resolution and consumption are conditional updates: a `false` return
//! means another writer already moved the row out of the expected state, and
//! the caller must re-read rather than retry.

mod schema;
mod sqlite;

pub use schema::SESSION_SCHEMA;
pub use sqlite::SqliteStore;

use crate::model::{App, Device, Policy, Session, SessionDeviceOtp};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("session not found")]
    SessionNotFound,

    #[error("device OTP not found")]
    DeviceOtpNotFound,

    #[error("device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("app not found: {app_id}")]
    AppNotFound { app_id: String },

    #[error("unique constraint violated on {field}")]
    Conflict { field: String },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Durable CRUD for sessions and device OTPs.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, session: &Session) -> Result<(), StoreError>;
    fn get_session(&self, id: &str) -> Result<Session, StoreError>;
    fn get_session_by_auth_code(&self, code: &str) -> Result<Session, StoreError>;
    fn get_session_by_access_token(&self, token: &str) -> Result<Session, StoreError>;
    fn update_session(&self, session: &Session) -> Result<(), StoreError>;

    fn create_device_otp(&self, otp: &SessionDeviceOtp) -> Result<(), StoreError>;
    fn get_device_otp(&self, id: &str) -> Result<SessionDeviceOtp, StoreError>;
    /// Values are only unique within the (device, session, value) triple.
    fn get_device_otp_by_value(
        &self,
        device_id: &str,
        session_id: &str,
        value: &str,
    ) -> Result<SessionDeviceOtp, StoreError>;
    /// pending → approved/denied. Returns `false` when the OTP was no longer
    /// pending and unused.
    fn resolve_device_otp(
        &self,
        id: &str,
        approved: bool,
        updated_at: i64,
    ) -> Result<bool, StoreError>;
    /// Flag as consumed. Returns `false` when already used.
    fn mark_device_otp_used(&self, id: &str, updated_at: i64) -> Result<bool, StoreError>;
}

pub trait DeviceDirectory: Send + Sync {
    fn register_device(&self, device: &Device) -> Result<(), StoreError>;
    /// Devices ordered by registration time, oldest first. `None` lists every device.
    fn devices_for_user(&self, user_id: Option<&str>) -> Result<Vec<Device>, StoreError>;
}

pub trait AppDirectory: Send + Sync {
    fn get_app(&self, app_id: &str) -> Result<App, StoreError>;
    fn get_app_by_resolver_metadata_id(&self, resolver_id: &str) -> Result<App, StoreError>;
}

pub trait PolicySource: Send + Sync {
    /// Policies governing calls made by `app_id`.
    fn policies_for_app(&self, app_id: &str) -> Result<Vec<Policy>, StoreError>;
}
