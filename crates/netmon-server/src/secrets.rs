//! Secrets file loading.
//!
//! The secrets live in a small JSON document next to the binary (default
//! `.env.json`):
//!
//! ```json
//! {
//!   "secret_key": "...",
//!   "google_client_id": "...",
//!   "google_client_secret": "...",
//!   "authenticated_users": ["alice@example.com"]
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use netmon_auth::AllowList;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("cannot read secrets file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("secrets file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("secrets file is missing a value for {0}")]
    Missing(&'static str),
}

#[derive(Clone, Deserialize)]
pub struct Secrets {
    /// Seed for the session cookie encryption key
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub google_client_secret: Option<String>,
    /// Emails allowed to read device records
    #[serde(default)]
    pub authenticated_users: Vec<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("secret_key", &"<redacted>")
            .field("google_client_id", &self.google_client_id)
            .field(
                "google_client_secret",
                &self.google_client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("authenticated_users", &self.authenticated_users.len())
            .finish()
    }
}

impl Secrets {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SecretsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SecretsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, text.trim())
    }

    fn from_json(path: &Path, text: &str) -> Result<Self, SecretsError> {
        let secrets: Self = serde_json::from_str(text).map_err(|source| SecretsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        secrets.validate()?;
        Ok(secrets)
    }

    pub fn validate(&self) -> Result<(), SecretsError> {
        if self.secret_key.trim().is_empty() {
            return Err(SecretsError::Missing("secret_key"));
        }
        if self.google_client_id.trim().is_empty() {
            return Err(SecretsError::Missing("google_client_id"));
        }
        Ok(())
    }

    pub fn allow_list(&self) -> AllowList {
        self.authenticated_users.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Secrets, SecretsError> {
        Secrets::from_json(Path::new(".env.json"), text)
    }

    #[test]
    fn test_parse_full_secrets() {
        let secrets = parse(
            r#"{
                "secret_key": "s3cret",
                "google_client_id": "cid.apps.googleusercontent.com",
                "google_client_secret": "shh",
                "authenticated_users": ["alice@example.com", " bob@example.com "]
            }"#,
        )
        .unwrap();

        let allow = secrets.allow_list();
        assert_eq!(allow.len(), 2);
        assert!(allow.contains("bob@example.com"));
        assert_eq!(secrets.google_client_secret.as_deref(), Some("shh"));
    }

    #[test]
    fn test_missing_values() {
        let err = parse(r#"{"google_client_id": "cid"}"#).unwrap_err();
        assert!(matches!(err, SecretsError::Missing("secret_key")));

        let err = parse(r#"{"secret_key": "k"}"#).unwrap_err();
        assert!(matches!(err, SecretsError::Missing("google_client_id")));
    }

    #[test]
    fn test_missing_users_means_nobody_allowed() {
        let secrets = parse(r#"{"secret_key": "k", "google_client_id": "cid"}"#).unwrap();
        assert!(secrets.allow_list().is_empty());
    }

    #[test]
    fn test_unreadable_file() {
        let err = Secrets::load("/nonexistent/.env.json").unwrap_err();
        assert!(matches!(err, SecretsError::Read { .. }));

        let err = parse("not json").unwrap_err();
        assert!(matches!(err, SecretsError::Parse { .. }));
    }

    #[test]
    fn test_debug_redacts() {
        let secrets = parse(
            r#"{"secret_key": "topsecret", "google_client_id": "cid", "google_client_secret": "shh"}"#,
        )
        .unwrap();
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("shh"));
    }
}
