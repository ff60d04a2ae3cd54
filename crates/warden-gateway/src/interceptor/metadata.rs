//! Call metadata, the per-call execution context and credential extraction.

use crate::auth::sensitive_headers::{redact_metadata, API_KEY_HEADER};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use warden_core::{AuthError, Principal};

pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Case-insensitive multimap of call metadata. Keys are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .push((key.as_ref().to_ascii_lowercase(), value.into()));
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries safe to log.
    pub fn redacted(&self) -> Vec<(String, String)> {
        redact_metadata(&self.entries)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Metadata::new();
        for (k, v) in iter {
            md.insert(k, v);
        }
        md
    }
}

/// Execution context of one inbound call.
///
/// `metadata` is `None` when the transport attached no metadata container
/// at all, which is distinct from an empty one.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    metadata: Option<Metadata>,
    principal: Option<Principal>,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn without_metadata() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// The single credential carried by a call.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw `authorization` value, scheme included.
    Bearer(String),
    ApiKey(String),
}

impl Credential {
    /// The authorization value takes precedence when both are present.
    pub fn extract(metadata: &Metadata) -> Result<Self, AuthError> {
        let non_empty = |key: &str| metadata.get(key).filter(|v| !v.trim().is_empty());

        if let Some(auth) = non_empty(AUTHORIZATION_HEADER) {
            return Ok(Self::Bearer(auth.to_string()));
        }
        if let Some(key) = non_empty(API_KEY_HEADER) {
            return Ok(Self::ApiKey(key.to_string()));
        }
        Err(AuthError::MissingCredential)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "jwt",
            Self::ApiKey(_) => "api_key",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential::{}([redacted])", self.kind())
    }
}
