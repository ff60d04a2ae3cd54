pub mod api_key;
pub mod config;
pub mod jwks;
pub mod sensitive_headers;
pub mod validation;
pub mod verifier;

pub use api_key::hash_api_key;
pub use config::{AuthConfig, AuthMode};
pub use jwks::JwksProvider;
pub use sensitive_headers::{
    build_downstream_headers, is_sensitive, redact_metadata, API_KEY_HEADER,
    SENSITIVE_HEADER_NAMES,
};
pub use validation::{Claims, TokenValidator};
pub use verifier::{IdentityVerifier, StandaloneVerifier};

#[cfg(test)]
pub mod tests;
