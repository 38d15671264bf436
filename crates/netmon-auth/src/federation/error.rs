//! Error types for identity provider operations.

/// Errors raised by the login exchange and the profile lookup.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// The held credential is past its expiry or was rejected by the
    /// provider with HTTP 401.
    #[error("Credential expired")]
    CredentialExpired,

    /// The callback could not be turned into a credential (bad `state`,
    /// missing code, token endpoint failure, unreadable token response).
    #[error("Authorization exchange failed: {0}")]
    AuthExchange(String),

    /// The provider answered the callback or the token request with an
    /// OAuth error.
    #[error("OAuth error from provider: {error} - {description}")]
    OAuthError {
        /// The OAuth error code.
        error: String,
        /// Optional error description.
        description: String,
    },

    /// The profile endpoint failed for a reason other than an expired
    /// credential.
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Provider configuration is unusable.
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse a URL.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl IdpError {
    /// Creates an `AuthExchange` error.
    #[must_use]
    pub fn auth_exchange(message: impl Into<String>) -> Self {
        Self::AuthExchange(message.into())
    }

    /// Creates an `OAuthError` from a provider response.
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuthError {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates a `ProfileFetch` error.
    #[must_use]
    pub fn profile_fetch(message: impl Into<String>) -> Self {
        Self::ProfileFetch(message.into())
    }

    /// Returns `true` if the credential has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::CredentialExpired)
    }

    /// Returns `true` if the login exchange failed.
    #[must_use]
    pub fn is_exchange_error(&self) -> bool {
        matches!(self, Self::AuthExchange(_) | Self::OAuthError { .. })
    }

    /// Returns `true` if the provider's profile endpoint failed.
    #[must_use]
    pub fn is_profile_error(&self) -> bool {
        matches!(self, Self::ProfileFetch(_))
    }
}
