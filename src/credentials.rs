//! Credential primitives (§4.1): raw API key generation, hashing, prefixing,
//! and constant-time comparison.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Number of random bytes in the key body (before hex-encoding).
const KEY_BODY_BYTES: usize = 32;

/// Length of the stored/displayed key prefix.
const PREFIX_LEN: usize = 8;

/// Generates a new raw API key: `<prefix><hex(32 random bytes)>`.
///
/// The prefix comes from configuration (`API_KEY_PREFIX`, default `aims_`)
/// and is not the same thing as [`key_prefix`], which extracts the first
/// 8 characters of the *returned* key for operator display.
#[must_use]
pub fn generate_api_key(prefix: &str) -> String {
    let mut body = [0u8; KEY_BODY_BYTES];
    rand::rng().fill_bytes(&mut body);
    format!("{prefix}{}", hex::encode(body))
}

/// SHA-256 hash of a raw API key, lowercase hex, for storage and lookup.
#[must_use]
pub fn hash_api_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// First 8 characters of a raw key, safe to store/display for operators to
/// recognize a key without revealing it.
#[must_use]
pub fn key_prefix(raw: &str) -> String {
    raw.chars().take(PREFIX_LEN).collect()
}

/// Constant-time equality check between two hex hash strings. Both sides are
/// already SHA-256 digests, but the comparison still runs in constant time
/// per the design note in spec §9.
#[must_use]
pub fn hashes_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_starts_with_prefix_and_has_expected_length() {
        // GIVEN: a configured prefix
        // WHEN: a key is generated
        let key = generate_api_key("aims_");

        // THEN: it starts with the prefix and has the expected hex body length
        assert!(key.starts_with("aims_"));
        assert_eq!(key.len(), "aims_".len() + KEY_BODY_BYTES * 2);
    }

    #[test]
    fn two_generated_keys_differ() {
        let a = generate_api_key("aims_");
        let b = generate_api_key("aims_");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic_lowercase_hex() {
        let raw = "aims_deadbeef";
        let h1 = hash_api_key(raw);
        let h2 = hash_api_key(raw);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn key_prefix_takes_first_eight_chars() {
        let raw = "aims_0123456789abcdef";
        assert_eq!(key_prefix(raw), "aims_012");
    }

    #[test]
    fn hashes_equal_matches_and_rejects() {
        let h = hash_api_key("secret");
        assert!(hashes_equal(&h, &hash_api_key("secret")));
        assert!(!hashes_equal(&h, &hash_api_key("other")));
    }
}
