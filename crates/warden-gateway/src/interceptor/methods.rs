//! Static classification of RPC methods by the authentication they require.

use std::collections::HashSet;

/// Methods served without any credential.
pub const NO_AUTH_METHODS: &[&str] = &[
    "/warden.v1.DeviceService/RegisterDevice",
    "/warden.v1.BadgeService/VerifyBadge",
    "/warden.v1.AuthService/ApproveToken",
    "/grpc.health.v1.Health/Check",
];

/// Methods reachable with an app-scoped API key.
pub const APP_AUTH_METHODS: &[&str] = &[
    "/warden.v1.AuthService/AppInfo",
    "/warden.v1.AuthService/Authorize",
    "/warden.v1.AuthService/Token",
    "/warden.v1.AuthService/ExtAuthz",
    "/warden.v1.BadgeService/IssueBadge",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    NoAuth,
    /// Authenticated; API keys must be app-scoped.
    AppAuth,
    /// Authenticated; API keys must be user-scoped.
    UserAuth,
}

impl MethodClass {
    pub fn allows_app_keys(self) -> bool {
        self == Self::AppAuth
    }
}

/// Exact fully-qualified method name sets.
#[derive(Debug, Clone)]
pub struct MethodTable {
    no_auth: HashSet<String>,
    app_auth: HashSet<String>,
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new(NO_AUTH_METHODS, APP_AUTH_METHODS)
    }
}

impl MethodTable {
    pub fn new<S: AsRef<str>>(no_auth: &[S], app_auth: &[S]) -> Self {
        let set = |names: &[S]| names.iter().map(|n| n.as_ref().to_string()).collect();
        Self {
            no_auth: set(no_auth),
            app_auth: set(app_auth),
        }
    }

    pub fn classify(&self, method: &str) -> MethodClass {
        if self.no_auth.contains(method) {
            MethodClass::NoAuth
        } else if self.app_auth.contains(method) {
            MethodClass::AppAuth
        } else {
            MethodClass::UserAuth
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let table = MethodTable::default();
        for m in NO_AUTH_METHODS {
            assert_eq!(table.classify(m), MethodClass::NoAuth);
        }
        for m in APP_AUTH_METHODS {
            assert!(table.classify(m).allows_app_keys(), "{m}");
        }
        assert_eq!(
            table.classify("/warden.v1.PolicyService/ListPolicies"),
            MethodClass::UserAuth
        );
    }

    #[test]
    fn matching_is_exact() {
        let table = MethodTable::default();
        assert_eq!(
            table.classify("/warden.v1.AuthService/AuthorizeAll"),
            MethodClass::UserAuth
        );
        assert_eq!(
            table.classify("warden.v1.AuthService/Authorize"),
            MethodClass::UserAuth
        );
    }
}
