//! The OAuth `state` parameter.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// 32 random bytes, base64url encoded without padding.
pub(crate) fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a random `state` value with 256 bits of entropy.
#[must_use]
pub fn generate_state() -> String {
    random_token()
}

/// Compares the returned `state` with the expected one in constant time.
#[must_use]
pub fn states_match(expected: &str, returned: &str) -> bool {
    if expected.len() != returned.len() {
        return false;
    }
    expected
        .bytes()
        .zip(returned.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
