//! Identity provider configuration.
//!
//! Defaults target Google's OAuth 2.0 endpoints. Any provider speaking the
//! authorization-code flow with a JSON userinfo endpoint can be configured by
//! overriding the endpoints.
//!
//! # Example
//!
//! ```ignore
//! use netmon_auth::federation::IdentityProviderConfig;
//!
//! let config = IdentityProviderConfig::google("client-id")
//!     .with_client_secret("client-secret")
//!     .with_public_url(Url::parse("https://netmon.example.com")?);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::IdpError;

/// Configuration for the external identity provider.
///
/// # Example (TOML)
///
/// ```toml
/// [provider]
/// id = "google"
/// public_url = "http://localhost:5000"
/// scopes = ["profile", "email"]
/// reprompt_consent = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProviderConfig {
    /// Provider identifier, used in the callback path
    /// (`/login/{id}/authorized`).
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// OAuth client ID. Usually supplied by the secrets file.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_id: String,

    /// OAuth client secret. Usually supplied by the secrets file.
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,

    /// Authorization endpoint.
    pub authorization_endpoint: Url,

    /// Token endpoint.
    pub token_endpoint: Url,

    /// Userinfo endpoint returning `{"email": ..., "name": ...}`.
    pub userinfo_endpoint: Url,

    /// Scopes to request.
    pub scopes: Vec<String>,

    /// Force the consent screen on every login (`prompt=consent`).
    pub reprompt_consent: bool,

    /// Externally visible base URL of the gateway, used to build the
    /// `redirect_uri`.
    pub public_url: Url,

    /// Timeout for token and userinfo requests.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Additional parameters appended to the authorization URL.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_auth_params: Vec<(String, String)>,
}

fn url(s: &str) -> Url {
    Url::parse(s).expect("static provider URL is valid")
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            id: "google".to_string(),
            name: "Google".to_string(),
            client_id: String::new(),
            client_secret: None,
            authorization_endpoint: url("https://accounts.google.com/o/oauth2/auth"),
            token_endpoint: url("https://accounts.google.com/o/oauth2/token"),
            userinfo_endpoint: url("https://www.googleapis.com/oauth2/v2/userinfo"),
            scopes: vec!["profile".to_string(), "email".to_string()],
            reprompt_consent: true,
            public_url: url("http://localhost:5000"),
            request_timeout: Duration::from_secs(30),
            extra_auth_params: Vec::new(),
        }
    }
}

impl IdentityProviderConfig {
    /// Google defaults with the given client ID.
    #[must_use]
    pub fn google(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the OAuth scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the authorization endpoint.
    #[must_use]
    pub fn with_authorization_endpoint(mut self, endpoint: Url) -> Self {
        self.authorization_endpoint = endpoint;
        self
    }

    /// Sets the token endpoint.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
        self.token_endpoint = endpoint;
        self
    }

    /// Sets the userinfo endpoint.
    #[must_use]
    pub fn with_userinfo_endpoint(mut self, endpoint: Url) -> Self {
        self.userinfo_endpoint = endpoint;
        self
    }

    /// Sets the public base URL of the gateway.
    #[must_use]
    pub fn with_public_url(mut self, public_url: Url) -> Self {
        self.public_url = public_url;
        self
    }

    /// Sets whether the consent screen is forced.
    #[must_use]
    pub fn with_reprompt_consent(mut self, reprompt: bool) -> Self {
        self.reprompt_consent = reprompt;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Adds an extra authorization parameter.
    #[must_use]
    pub fn with_extra_auth_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_auth_params.push((key.into(), value.into()));
        self
    }

    /// Path of the callback route for this provider.
    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("/login/{}/authorized", self.id)
    }

    /// Absolute callback URL sent as `redirect_uri`.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::UrlError` if the public URL cannot be joined.
    pub fn redirect_uri(&self) -> Result<Url, IdpError> {
        Ok(self.public_url.join(&self.callback_path())?)
    }

    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::InvalidConfig` naming the first problem found.
    pub fn validate(&self) -> Result<(), IdpError> {
        if self.id.trim().is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(IdpError::InvalidConfig(format!(
                "provider id '{}' must be a non-empty path segment",
                self.id
            )));
        }
        if self.client_id.trim().is_empty() {
            return Err(IdpError::InvalidConfig("client_id is required".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(IdpError::InvalidConfig(
                "at least one scope is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_defaults() {
        let config = IdentityProviderConfig::google("cid");
        assert_eq!(config.id, "google");
        assert_eq!(config.scopes, vec!["profile", "email"]);
        assert!(config.reprompt_consent);
        assert_eq!(
            config.userinfo_endpoint.as_str(),
            "https://www.googleapis.com/oauth2/v2/userinfo"
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redirect_uri() {
        let config = IdentityProviderConfig::google("cid")
            .with_public_url(Url::parse("https://netmon.example.com/").unwrap());
        assert_eq!(
            config.redirect_uri().unwrap().as_str(),
            "https://netmon.example.com/login/google/authorized"
        );
    }

    #[test]
    fn test_validate_rejects_missing_client_id() {
        let err = IdentityProviderConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("client_id"));

        let mut config = IdentityProviderConfig::google("cid");
        config.id = "a/b".to_string();
        assert!(config.validate().is_err());

        let config = IdentityProviderConfig::google("cid").with_scopes(Vec::<String>::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: IdentityProviderConfig = serde_json::from_str(
            r#"{"public_url": "http://127.0.0.1:8080", "request_timeout": "5s"}"#,
        )
        .unwrap();
        assert_eq!(config.id, "google");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.public_url.as_str(), "http://127.0.0.1:8080/");
        assert!(config.client_secret.is_none());
    }
}
