//! Delivery of device notifications as JSON webhooks.
//!
//! A device registers a subscription token holding the endpoint to call.
//! The request is built from the downstream header allowlist only.

use crate::auth::build_downstream_headers;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use warden_core::{Notification, NotificationDispatcher, NotifyError};

const MAX_ERROR_BODY: usize = 256;

/// Parsed form of a device's subscription token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: Url,
    #[serde(default)]
    pub p256dh: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
}

impl Subscription {
    pub fn parse(token: &str) -> Result<Self, NotifyError> {
        if token.trim().is_empty() {
            return Err(NotifyError::InvalidSubscription {
                reason: "empty subscription token".into(),
            });
        }
        let sub: Subscription =
            serde_json::from_str(token).map_err(|e| NotifyError::InvalidSubscription {
                reason: e.to_string(),
            })?;
        if !matches!(sub.endpoint.scheme(), "https" | "http") {
            return Err(NotifyError::InvalidSubscription {
                reason: format!("unsupported endpoint scheme '{}'", sub.endpoint.scheme()),
            });
        }
        Ok(sub)
    }
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("warden-gateway/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn send(
        &self,
        subscription_token: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let sub = Subscription::parse(subscription_token)?;

        let mut request = self.client.post(sub.endpoint.clone()).json(notification);
        for (name, value) in build_downstream_headers() {
            request = request.header(name, value);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let mut message = resp.text().await.unwrap_or_default();
            message.truncate(
                message
                    .char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(message.len(), |(i, _)| i),
            );
            tracing::warn!(
                event = "notify.webhook_rejected",
                host = sub.endpoint.host_str().unwrap_or_default(),
                status = status.as_u16(),
            );
            return Err(NotifyError::Delivery {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(
            event = "notify.webhook_delivered",
            host = sub.endpoint.host_str().unwrap_or_default(),
            kind = ?notification.kind,
        );
        Ok(())
    }
}
