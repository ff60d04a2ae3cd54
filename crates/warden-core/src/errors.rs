//! Error taxonomy surfaced at the call boundary.
//!
//! Every [`AuthError`] carries a [`StatusCode`] class and a stable reason code.
//! Semantic failures ("you are not authorized") and infrastructure failures
//! ("we could not check") never share a class: store and notification
//! failures are `Internal` and only expose an opaque message.

use crate::notify::NotifyError;
use crate::store::StoreError;
use std::fmt;
use thiserror::Error;

/// Reason codes (machine-parseable, stable across releases).
pub mod reason_codes {
    pub const MISSING_METADATA: &str = "auth.missingMetadata";
    pub const MISSING_CREDENTIAL: &str = "auth.missingCredential";
    pub const INVALID_CREDENTIAL: &str = "auth.invalidCredential";
    pub const INVALID_CALLER_APP: &str = "auth.invalidCallerAppId";
    pub const APP_NOT_FOUND: &str = "auth.appNotFound";
    pub const OTP_NOT_FOUND: &str = "auth.deviceOtpNotFound";
    pub const OTP_EXPIRED: &str = "auth.otpExpired";
    pub const OTP_ALREADY_USED: &str = "auth.otpAlreadyUsed";
    pub const OTP_DENIED: &str = "auth.otpDenied";
    pub const APPROVAL_TIMEOUT: &str = "auth.approvalTimeout";
    pub const SESSION_NOT_FOUND: &str = "auth.sessionNotFound";
    pub const SESSION_EXPIRED: &str = "auth.sessionExpired";
    pub const INVALID_TOKEN_FOR_APP: &str = "auth.invalidAccessTokenForApp";
    pub const INVALID_TOKEN_FOR_TOOL: &str = "auth.invalidAccessTokenForTool";
    pub const INVALID_ACCESS_TOKEN: &str = "auth.invalidAccessToken";
    pub const NO_MATCHING_RULE: &str = "auth.unauthorized";
    pub const NO_DEVICES: &str = "auth.noDevicesRegistered";
    pub const DEADLINE_EXCEEDED: &str = "auth.deadlineExceeded";
    pub const STORE: &str = "internal.store";
    pub const NOTIFICATION: &str = "internal.notification";
    pub const TOKEN_ISSUANCE: &str = "internal.tokenIssuance";
}

/// Status class of an error, aligned with RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    NotFound,
    DeadlineExceeded,
    Internal,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which session binding rejected the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    App,
    Tool,
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App => f.write_str("app"),
            Self::Tool => f.write_str("tool"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to extract metadata from context")]
    MissingMetadata,

    #[error("failed to extract authorization")]
    MissingCredential,

    #[error("invalid credential: {reason}")]
    InvalidCredential { reason: String },

    #[error("caller application ID should be present in the request")]
    MissingCallerApp,

    #[error("application not found: {app_id}")]
    AppNotFound { app_id: String },

    #[error("device OTP not found")]
    OtpNotFound,

    #[error("the device OTP is expired")]
    OtpExpired,

    #[error("the device OTP is already used")]
    OtpAlreadyUsed,

    #[error("the device OTP has been denied by the user")]
    OtpDenied,

    #[error("no device response within {waited_secs}s")]
    ApprovalTimeout { waited_secs: u64 },

    #[error("session not found")]
    SessionNotFound,

    #[error("the session has expired")]
    SessionExpired,

    #[error("the access token is not valid for the specified {field}")]
    SessionMismatch { field: SessionField },

    #[error("the access token is invalid: {reason}")]
    InvalidAccessToken { reason: String },

    #[error("the application is unauthorized to make a call")]
    NoMatchingRule,

    #[error("no user devices registered, unable to send a notification for user approval")]
    NoDevicesRegistered,

    #[error("{message}")]
    InvalidRequest {
        reason: &'static str,
        message: String,
    },

    #[error("credential verification did not finish before the call deadline")]
    DeadlineExceeded,

    #[error("token issuance failed: {0}")]
    TokenIssuance(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("notification error: {0}")]
    Notification(#[from] NotifyError),
}

impl AuthError {
    pub fn invalid_credential(reason: impl Into<String>) -> Self {
        Self::InvalidCredential {
            reason: reason.into(),
        }
    }

    pub fn invalid_request(reason: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason,
            message: message.into(),
        }
    }

    pub fn code(&self) -> StatusCode {
        match self {
            Self::MissingMetadata => StatusCode::Internal,
            Self::MissingCredential
            | Self::InvalidCredential { .. }
            | Self::MissingCallerApp
            | Self::SessionNotFound
            | Self::SessionExpired
            | Self::SessionMismatch { .. }
            | Self::InvalidAccessToken { .. }
            | Self::OtpExpired
            | Self::OtpAlreadyUsed
            | Self::OtpDenied
            | Self::ApprovalTimeout { .. } => StatusCode::Unauthenticated,
            Self::NoMatchingRule => StatusCode::PermissionDenied,
            Self::AppNotFound { .. } | Self::OtpNotFound => StatusCode::NotFound,
            Self::NoDevicesRegistered | Self::InvalidRequest { .. } => StatusCode::InvalidArgument,
            Self::DeadlineExceeded => StatusCode::DeadlineExceeded,
            Self::TokenIssuance(_) | Self::Store(_) | Self::Notification(_) => {
                StatusCode::Internal
            }
        }
    }

    pub fn reason_code(&self) -> &'static str {
        use reason_codes::*;
        match self {
            Self::MissingMetadata => MISSING_METADATA,
            Self::MissingCredential => MISSING_CREDENTIAL,
            Self::InvalidCredential { .. } => INVALID_CREDENTIAL,
            Self::MissingCallerApp => INVALID_CALLER_APP,
            Self::AppNotFound { .. } => APP_NOT_FOUND,
            Self::OtpNotFound => OTP_NOT_FOUND,
            Self::OtpExpired => OTP_EXPIRED,
            Self::OtpAlreadyUsed => OTP_ALREADY_USED,
            Self::OtpDenied => OTP_DENIED,
            Self::ApprovalTimeout { .. } => APPROVAL_TIMEOUT,
            Self::SessionNotFound => SESSION_NOT_FOUND,
            Self::SessionExpired => SESSION_EXPIRED,
            Self::SessionMismatch {
                field: SessionField::App,
            } => INVALID_TOKEN_FOR_APP,
            Self::SessionMismatch {
                field: SessionField::Tool,
            } => INVALID_TOKEN_FOR_TOOL,
            Self::InvalidAccessToken { .. } => INVALID_ACCESS_TOKEN,
            Self::NoMatchingRule => NO_MATCHING_RULE,
            Self::NoDevicesRegistered => NO_DEVICES,
            Self::InvalidRequest { reason, .. } => *reason,
            Self::DeadlineExceeded => DEADLINE_EXCEEDED,
            Self::TokenIssuance(_) => TOKEN_ISSUANCE,
            Self::Store(_) => STORE,
            Self::Notification(_) => NOTIFICATION,
        }
    }

    /// Message safe to return to the caller. Internal failures are opaque;
    /// credential failures never reveal which check failed.
    pub fn public_message(&self) -> String {
        match self.code() {
            StatusCode::Internal if !matches!(self, Self::MissingMetadata) => {
                "internal error".to_string()
            }
            _ => match self {
                Self::MissingCredential | Self::InvalidCredential { .. } => {
                    "the request could not be authenticated".to_string()
                }
                Self::InvalidAccessToken { .. } => "the access token is invalid".to_string(),
                other => other.to_string(),
            },
        }
    }

    /// OTP expiry and approval timeout are both expiry-class outcomes.
    pub fn is_expiry(&self) -> bool {
        matches!(
            self,
            Self::OtpExpired | Self::ApprovalTimeout { .. } | Self::SessionExpired
        )
    }
}
