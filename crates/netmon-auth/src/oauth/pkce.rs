//! PKCE (RFC 7636) for the outbound login flow.
//!
//! `/login` creates a [`PkceVerifier`] and keeps it in the session; the
//! authorization redirect only carries its S256 [`PkceChallenge`]. The
//! callback sends the verifier itself to the token endpoint.
//!
//! ```
//! use netmon_auth::oauth::{PkceChallenge, PkceVerifier};
//!
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::for_verifier(&verifier);
//! assert_ne!(challenge.as_str(), verifier.as_str());
//! ```

use std::ops::RangeInclusive;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::state::random_token;

const VERIFIER_LEN: RangeInclusive<usize> = 43..=128;

/// A verifier read back from the session cookie failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PkceError {
    #[error("code verifier must be 43 to 128 characters long, got {0}")]
    Length(usize),

    #[error("code verifier contains {0:?}, which is not an unreserved URL character")]
    Character(char),
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// A PKCE code verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Accepts an existing verifier after checking its length and alphabet.
    ///
    /// # Errors
    ///
    /// [`PkceError::Length`] or [`PkceError::Character`].
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        if !VERIFIER_LEN.contains(&verifier.len()) {
            return Err(PkceError::Length(verifier.len()));
        }
        if let Some(bad) = verifier.chars().find(|c| !is_unreserved(*c)) {
            return Err(PkceError::Character(bad));
        }
        Ok(Self(verifier))
    }

    /// A fresh verifier: 32 random bytes, base64url encoded (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(random_token())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PkceVerifier {
    type Error = PkceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PkceVerifier> for String {
    fn from(verifier: PkceVerifier) -> Self {
        verifier.0
    }
}

/// The `code_challenge` sent with the authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Value of `code_challenge_method`. Plain challenges are never sent.
    pub const METHOD: &'static str = "S256";

    /// `BASE64URL(SHA256(verifier))`.
    #[must_use]
    pub fn for_verifier(verifier: &PkceVerifier) -> Self {
        Self(URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_str())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_verifiers_are_valid_and_distinct() {
        let first = PkceVerifier::generate();
        let second = PkceVerifier::generate();
        assert_eq!(first.as_str().len(), 43);
        assert_ne!(first, second);
        assert_eq!(PkceVerifier::new(first.as_str().to_owned()), Ok(first));
    }

    #[test]
    fn rejects_bad_verifiers() {
        assert_eq!(PkceVerifier::new("short".into()), Err(PkceError::Length(5)));
        assert_eq!(
            PkceVerifier::new("x".repeat(129)),
            Err(PkceError::Length(129))
        );
        assert_eq!(
            PkceVerifier::new(format!("{}+", "x".repeat(42))),
            Err(PkceError::Character('+'))
        );
        assert!(PkceVerifier::new("a-b.c_d~".repeat(6)).is_ok());
    }

    #[test]
    fn challenge_matches_rfc_example() {
        // RFC 7636, appendix B
        let verifier = PkceVerifier::new("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into())
            .expect("valid verifier");
        assert_eq!(
            PkceChallenge::for_verifier(&verifier).as_str(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn tampered_cookie_verifier_does_not_deserialize() {
        let verifier = PkceVerifier::generate();
        let json = serde_json::to_string(&verifier).unwrap();
        assert_eq!(serde_json::from_str::<PkceVerifier>(&json).unwrap(), verifier);
        assert!(serde_json::from_str::<PkceVerifier>("\"tiny\"").is_err());
    }
}
