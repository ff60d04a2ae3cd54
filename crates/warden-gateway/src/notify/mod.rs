mod webhook;

pub use webhook::{Subscription, WebhookDispatcher};
