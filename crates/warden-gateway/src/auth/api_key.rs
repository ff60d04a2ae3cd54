use sha2::{Digest, Sha256};

/// Lowercase SHA-256 hex digest under which an API key is catalogued.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
