//! Call boundary of the warden service.
//!
//! - [`interceptor`]: per-call authentication (method table, credential extraction, deadline)
//! - [`auth`]: JWT validation against a JWKS, API-key lookup, header hygiene
//! - [`token`]: self-issued access tokens for the token exchange
//! - [`notify`]: webhook delivery of device notifications
//! - [`gateway`]: assembly of all of the above from [`config::GatewayConfig`]

pub mod auth;
pub mod config;
pub mod gateway;
pub mod interceptor;
pub mod notify;
pub mod token;

pub use config::{ConfigError, GatewayConfig};
pub use gateway::Gateway;
pub use interceptor::{AuthInterceptor, CallContext, Metadata, Status};
pub use notify::WebhookDispatcher;
pub use token::JwtTokenIssuer;
