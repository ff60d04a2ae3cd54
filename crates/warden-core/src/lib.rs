//! Core of the warden authorization service.
//!
//! Apps (agents, MCP servers) call each other with short-lived access tokens.
//! This crate owns the parts of that exchange that carry state:
//!
//! - [`model`]: sessions, device OTPs, policies/rules/tasks, devices and apps
//! - [`policy`]: the rule evaluator deciding allow / needs-approval / deny
//! - [`approval`]: the device OTP state machine (issue, approve, deny, wait, consume)
//! - [`service`]: the authorize / token / ext-authz / approve-token flows
//! - [`store`]: store contracts and the SQLite implementation
//!
//! ```text
//! call ──▶ ext_authz ──▶ PolicyEvaluator ──▶ rule.needs_approval?
//!                                              │ yes
//!                                              ▼
//!                          OtpStateMachine::issue ──▶ NotificationDispatcher ──▶ device
//!                                              │                                  │
//!                          wait_for_approval ◀─┴────── approve_token ◀────────────┘
//! ```
//!
//! Time and randomness are injected ([`Clock`], [`SecretSource`]) so expiry
//! boundaries can be pinned in tests.

pub mod approval;
pub mod catalog;
pub mod clock;
pub mod errors;
pub mod model;
pub mod notify;
pub mod policy;
pub mod principal;
pub mod secrets;
pub mod service;
pub mod store;

pub use approval::{ApprovalConfig, OtpStateMachine, OtpStatus};
pub use catalog::{ApiKeyEntry, Catalog, CatalogError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{AuthError, SessionField, StatusCode};
pub use model::{
    App, AppType, ApprovalRequestInfo, Device, Notification, NotificationType, Policy, Rule,
    RuleAction, Session, SessionDeviceOtp, Task,
};
pub use notify::{ApprovalRequest, NotificationDispatcher, NotifyError};
pub use policy::{Decision, PolicyEvaluator};
pub use principal::Principal;
pub use secrets::{OsSecretSource, SecretSource};
pub use service::{AuthService, AuthServiceDeps, TokenIssuer};
pub use store::{
    AppDirectory, DeviceDirectory, PolicySource, SessionStore, SqliteStore, StoreError,
};
