//! OAuth 2.0 authorization-code client for the external identity provider.
//!
//! # Overview
//!
//! 1. [`IdpClient::begin_login`] builds the redirect to the provider with a
//!    fresh `state` and PKCE challenge.
//! 2. [`IdpClient::complete_login`] checks the callback against the pending
//!    login and exchanges the code for a [`SessionCredential`].
//! 3. [`IdpClient::fetch_identity`] reads the user's profile with that
//!    credential.

use std::fmt;

use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use super::error::IdpError;
use super::provider::IdentityProviderConfig;
use crate::identity::Identity;
use crate::oauth::{PkceChallenge, PkceVerifier, generate_state, states_match};
use crate::session::{PendingLogin, SessionCredential};

/// A prepared redirect to the provider's authorization endpoint.
#[derive(Debug)]
pub struct LoginRequest {
    /// Where to send the browser.
    pub authorization_url: Url,
    /// The `state` value embedded in the URL.
    pub state: String,
    /// The verifier whose challenge is embedded in the URL.
    pub pkce_verifier: PkceVerifier,
}

impl LoginRequest {
    /// What the session must remember until the callback arrives.
    #[must_use]
    pub fn pending(&self) -> PendingLogin {
        PendingLogin {
            state: self.state.clone(),
            pkce_verifier: self.pkce_verifier.clone(),
        }
    }
}

/// Query parameters of the provider's redirect back to the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// Echoed `state`.
    pub state: Option<String>,
    /// OAuth error code if the user or provider refused.
    pub error: Option<String>,
    /// Human-readable error description.
    pub error_description: Option<String>,
}

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// OAuth error response from the provider.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Client for one identity provider.
#[derive(Clone)]
pub struct IdpClient {
    http: reqwest::Client,
    config: IdentityProviderConfig,
    redirect_uri: Url,
}

impl fmt::Debug for IdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpClient")
            .field("provider", &self.config.id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish_non_exhaustive()
    }
}

impl IdpClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::InvalidConfig` if the configuration does not
    /// validate or the HTTP client cannot be built.
    pub fn new(config: IdentityProviderConfig) -> Result<Self, IdpError> {
        config.validate()?;
        let redirect_uri = config.redirect_uri()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IdpError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            redirect_uri,
        })
    }

    /// Provider configuration.
    #[must_use]
    pub fn config(&self) -> &IdentityProviderConfig {
        &self.config
    }

    /// Provider identifier.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.config.id
    }

    /// Starts a login: a fresh `state`, a PKCE verifier and the URL carrying
    /// both (the challenge, not the verifier).
    #[must_use]
    pub fn begin_login(&self) -> LoginRequest {
        let state = generate_state();
        let pkce_verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::for_verifier(&pkce_verifier);

        let mut url = self.config.authorization_endpoint.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.config.client_id);
            params.append_pair("redirect_uri", self.redirect_uri.as_str());
            params.append_pair("scope", &self.config.scopes.join(" "));
            params.append_pair("state", &state);
            params.append_pair("code_challenge", challenge.as_str());
            params.append_pair("code_challenge_method", PkceChallenge::METHOD);
            if self.config.reprompt_consent {
                params.append_pair("prompt", "consent");
            }
            for (key, value) in &self.config.extra_auth_params {
                params.append_pair(key, value);
            }
        }

        tracing::debug!(
            provider = %self.config.id,
            endpoint = %self.config.authorization_endpoint,
            "Starting login"
        );

        LoginRequest {
            authorization_url: url,
            state,
            pkce_verifier,
        }
    }

    /// Completes a login from the provider's callback.
    ///
    /// # Errors
    ///
    /// - `IdpError::OAuthError` if the callback or token endpoint carries an
    ///   OAuth error
    /// - `IdpError::AuthExchange` for a missing pending login, a `state`
    ///   mismatch, a missing code, or any other token endpoint failure
    pub async fn complete_login(
        &self,
        params: &CallbackParams,
        pending: Option<PendingLogin>,
    ) -> Result<SessionCredential, IdpError> {
        if let Some(error) = &params.error {
            return Err(IdpError::oauth_error(
                error.clone(),
                params.error_description.clone().unwrap_or_default(),
            ));
        }

        let pending = pending.ok_or_else(|| IdpError::auth_exchange("no login in progress"))?;

        let returned_state = params.state.as_deref().unwrap_or_default();
        if !states_match(&pending.state, returned_state) {
            return Err(IdpError::auth_exchange("state mismatch"));
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| IdpError::auth_exchange("missing authorization code"))?;

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", pending.pkce_verifier.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        tracing::debug!(endpoint = %self.config.token_endpoint, "Exchanging authorization code");

        let response = self
            .http
            .post(self.config.token_endpoint.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| IdpError::auth_exchange(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(IdpError::oauth_error(
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default(),
                ));
            }

            return Err(IdpError::auth_exchange(format!("HTTP {status}")));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            IdpError::auth_exchange(format!("failed to parse token response: {e}"))
        })?;

        if token.access_token.is_empty() {
            return Err(IdpError::auth_exchange("token response has no access_token"));
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = token
            .expires_in
            .map(|secs| now + time::Duration::seconds(secs.max(0)));

        tracing::info!(provider = %self.config.id, "Login completed");

        Ok(SessionCredential {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_at,
            scope: token.scope,
        })
    }

    /// Reads the profile of the credential's owner.
    ///
    /// # Errors
    ///
    /// - `IdpError::CredentialExpired` if the provider answers HTTP 401
    /// - `IdpError::ProfileFetch` for any other failure
    pub async fn fetch_identity(&self, credential: &SessionCredential) -> Result<Identity, IdpError> {
        let response = self
            .http
            .get(self.config.userinfo_endpoint.clone())
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| IdpError::profile_fetch(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::debug!(provider = %self.config.id, "Provider rejected credential");
            return Err(IdpError::CredentialExpired);
        }
        if !status.is_success() {
            return Err(IdpError::profile_fetch(format!(
                "userinfo request failed: HTTP {status}"
            )));
        }

        response.json::<Identity>().await.map_err(|e| {
            IdpError::profile_fetch(format!("failed to parse userinfo response: {e}"))
        })
    }
}
