use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device paired by a user to receive approval requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub user_id: String,
    /// Push subscription, as registered by the device.
    pub subscription_token: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    #[default]
    Unspecified,
    Info,
    ApprovalRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequestInfo {
    pub caller_app: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee_app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub otp: String,
    pub device_id: String,
    pub session_id: String,
    pub timeout_in_seconds: u64,
}

/// Payload delivered to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub body: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_request_info: Option<ApprovalRequestInfo>,
}
