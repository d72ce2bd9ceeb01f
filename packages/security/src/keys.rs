// ABOUTME: Agent API key generation, hashing, and verification
// ABOUTME: Only the SHA-256 hash and a short display prefix are ever stored

use base64::Engine;
use benos_core::key_prefix;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const KEY_PREFIX: &str = "benos_";

/// Result of issuing a key. The plaintext exists only here.
#[derive(Debug, Clone)]
pub struct KeyGeneration {
    pub key: String,
    pub key_hash: String,
    pub key_prefix: String,
}

/// `benos_` followed by 32 random bytes, URL-safe base64 without padding
pub fn generate_key() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    format!(
        "{}{}",
        KEY_PREFIX,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
    )
}

pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of a presented key against a stored hash
pub fn verify_key_hash(key: &str, stored_hash: &str) -> bool {
    let computed = hash_key(key);
    computed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

pub fn issue_key() -> KeyGeneration {
    let key = generate_key();
    KeyGeneration {
        key_hash: hash_key(&key),
        key_prefix: key_prefix(&key),
        key,
    }
}

/// Cheap shape check before touching the database
pub fn looks_like_key(candidate: &str) -> bool {
    candidate
        .strip_prefix(KEY_PREFIX)
        .is_some_and(|rest| rest.len() == 43 && rest.chars().all(is_url_safe_base64))
}

fn is_url_safe_base64(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
