//! Source of bearer secrets (OTP values, authorization codes).
//!
//! Values produced here are transmitted to devices and matched back, so the
//! production source draws from the operating system CSPRNG.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

pub trait SecretSource: Send + Sync {
    /// Generate an opaque alphanumeric secret of exactly `len` characters.
    fn generate(&self, len: usize) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecretSource;

impl SecretSource for OsSecretSource {
    fn generate(&self, len: usize) -> String {
        OsRng
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_exact_length_alphanumeric() {
        let value = OsSecretSource.generate(128);
        assert_eq!(value.len(), 128);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn values_do_not_repeat() {
        let seen: HashSet<String> = (0..64).map(|_| OsSecretSource.generate(32)).collect();
        assert_eq!(seen.len(), 64);
    }
}
