//! Process exit codes. Scripts depend on these.

pub const SUCCESS: i32 = 0;
/// The check ran and said no (policy denied, OTP rejected).
pub const DENIED: i32 = 1;
/// Configuration, catalog or database could not be used.
pub const CONFIG_ERROR: i32 = 2;
