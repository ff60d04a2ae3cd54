//! Notification payloads and the dispatcher contract.
//!
//! The core only builds payloads; delivery is an external collaborator
//! (see `warden-gateway`'s webhook dispatcher).

use crate::model::{ApprovalRequestInfo, Notification, NotificationType};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("invalid subscription token: {reason}")]
    InvalidSubscription { reason: String },

    #[error("delivery rejected with status {status}: {message}")]
    Delivery { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver `notification` to the device owning `subscription_token`.
    async fn send(
        &self,
        subscription_token: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError>;
}

/// Everything needed to describe a pending call to the approving user.
#[derive(Debug, Clone)]
pub struct ApprovalRequest<'a> {
    pub caller_app: &'a str,
    pub callee_app: Option<&'a str>,
    pub tool_name: Option<&'a str>,
    pub otp: &'a str,
    pub device_id: &'a str,
    pub session_id: &'a str,
    pub timeout_in_seconds: u64,
}

impl Notification {
    pub fn approval_request(req: ApprovalRequest<'_>) -> Self {
        let callee = req.callee_app.unwrap_or_default();
        let tool = req.tool_name.filter(|t| !t.is_empty());
        let body = match tool {
            Some(tool) => format!(
                "The agent '{}' is trying to invoke the tool '{}' of the MCP server '{}'",
                req.caller_app, tool, callee
            ),
            None => format!(
                "The agent '{}' is trying to call the agent '{}'",
                req.caller_app, callee
            ),
        };

        Self {
            body,
            kind: NotificationType::ApprovalRequest,
            approval_request_info: Some(ApprovalRequestInfo {
                caller_app: req.caller_app.to_string(),
                callee_app: req.callee_app.map(str::to_string),
                tool_name: tool.map(str::to_string),
                otp: req.otp.to_string(),
                device_id: req.device_id.to_string(),
                session_id: req.session_id.to_string(),
                timeout_in_seconds: req.timeout_in_seconds,
            }),
        }
    }

    pub fn device_registered() -> Self {
        Self::info("All is set for Identity Approvals.")
    }

    pub fn info(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            kind: NotificationType::Info,
            approval_request_info: None,
        }
    }
}
