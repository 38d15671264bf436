//! Browser sessions and the credential they carry.
//!
//! All per-browser state lives in one private cookie: the value is the JSON
//! form of the session data, encrypted and authenticated with a key derived
//! from the configured secret. Nothing is kept server-side, so requests from
//! different browsers share no mutable state.
//!
//! Expiry is detected lazily: a credential is only found to be expired when
//! it is about to be used, either from its recorded expiry time or because
//! the provider rejects it.

use std::fmt;
use std::sync::Arc;

use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use time::OffsetDateTime;
use url::Url;

use crate::config::SessionConfig;
use crate::federation::{CallbackParams, IdpClient, IdpError};
use crate::identity::Identity;
use crate::oauth::PkceVerifier;

/// Derives the 64-byte cookie encryption key from the application secret.
#[must_use]
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

// =============================================================================
// Session contents
// =============================================================================

/// The provider credential bound to a browser session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// Bearer token for the provider's APIs.
    pub access_token: String,

    /// Token type, normally `Bearer`.
    pub token_type: String,

    /// When the provider said the token stops working.
    #[serde(default, with = "time::serde::timestamp::option")]
    pub expires_at: Option<OffsetDateTime>,

    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl SessionCredential {
    /// Returns `true` if the credential has a recorded expiry at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A login started by `/login` and not yet completed by the callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingLogin {
    /// Expected `state`.
    pub state: String,
    /// PKCE verifier for the token request.
    pub pkce_verifier: PkceVerifier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential: Option<SessionCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<PendingLogin>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.credential.is_none() && self.pending.is_none()
    }
}

// =============================================================================
// Session
// =============================================================================

/// One browser's session, read from and written back to its cookie jar.
///
/// Return the session (or [`Session::into_jar`]) from the handler so changes
/// reach the browser.
pub struct Session {
    jar: PrivateCookieJar,
    config: Arc<SessionConfig>,
    data: SessionData,
    changed: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie", &self.config.cookie_name)
            .field("data", &self.data)
            .field("changed", &self.changed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Reads the session from `jar`. A missing, tampered or unreadable cookie
    /// yields an empty session.
    #[must_use]
    pub fn load(jar: PrivateCookieJar, config: Arc<SessionConfig>) -> Self {
        let data = match jar.get(&config.cookie_name) {
            Some(cookie) => serde_json::from_str(cookie.value()).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Discarding unreadable session cookie");
                SessionData::default()
            }),
            None => SessionData::default(),
        };

        Self {
            jar,
            config,
            data,
            changed: false,
        }
    }

    /// The held credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&SessionCredential> {
        self.data.credential.as_ref()
    }

    /// Stores a credential, replacing any previous one.
    pub fn set_credential(&mut self, credential: SessionCredential) {
        self.data.credential = Some(credential);
        self.changed = true;
    }

    /// Drops the credential.
    pub fn clear_credential(&mut self) {
        if self.data.credential.take().is_some() {
            self.changed = true;
        }
    }

    /// The pending login, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingLogin> {
        self.data.pending.as_ref()
    }

    /// Records a login in progress, replacing any previous one.
    pub fn set_pending(&mut self, pending: PendingLogin) {
        self.data.pending = Some(pending);
        self.changed = true;
    }

    /// Removes and returns the pending login.
    pub fn take_pending(&mut self) -> Option<PendingLogin> {
        let pending = self.data.pending.take();
        if pending.is_some() {
            self.changed = true;
        }
        pending
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data = SessionData::default();
            self.changed = true;
        }
    }

    /// Writes pending changes into the jar and returns it.
    #[must_use]
    pub fn into_jar(self) -> PrivateCookieJar {
        if !self.changed {
            return self.jar;
        }

        let name = self.config.cookie_name.clone();
        if self.data.is_empty() {
            return self
                .jar
                .remove(Cookie::build((name, "")).path("/").build());
        }

        let value = match serde_json::to_string(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize session");
                return self.jar;
            }
        };

        let cookie = Cookie::build((name, value))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.config.cookie_max_age())
            .build();
        self.jar.add(cookie)
    }
}

impl IntoResponseParts for Session {
    type Error = std::convert::Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.into_jar().into_response_parts(res)
    }
}

// =============================================================================
// Session manager
// =============================================================================

/// Ties sessions to the identity provider.
#[derive(Debug, Clone)]
pub struct SessionManager {
    client: Arc<IdpClient>,
    config: Arc<SessionConfig>,
}

impl SessionManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(client: Arc<IdpClient>, config: SessionConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// The identity provider client.
    #[must_use]
    pub fn client(&self) -> &IdpClient {
        &self.client
    }

    /// Reads the session carried by `jar`.
    #[must_use]
    pub fn load(&self, jar: PrivateCookieJar) -> Session {
        Session::load(jar, Arc::clone(&self.config))
    }

    /// Returns `true` if the session holds a credential. Never contacts the
    /// provider, so an expired credential still counts.
    #[must_use]
    pub fn is_authenticated(&self, session: &Session) -> bool {
        session
            .credential()
            .is_some_and(|c| !c.access_token.is_empty())
    }

    /// Fetches the identity behind the session's credential.
    ///
    /// An expired credential is removed from the session.
    ///
    /// # Errors
    ///
    /// - `IdpError::CredentialExpired` if there is no usable credential, its
    ///   expiry time has passed (no network call), or the provider rejects it
    /// - `IdpError::ProfileFetch` for other provider failures
    pub async fn current_identity(&self, session: &mut Session) -> Result<Identity, IdpError> {
        let Some(credential) = session.credential().cloned() else {
            return Err(IdpError::CredentialExpired);
        };

        if credential.is_expired_at(OffsetDateTime::now_utc()) {
            tracing::debug!("Session credential past its expiry time");
            session.clear_credential();
            return Err(IdpError::CredentialExpired);
        }

        match self.client.fetch_identity(&credential).await {
            Err(IdpError::CredentialExpired) => {
                session.clear_credential();
                Err(IdpError::CredentialExpired)
            }
            other => other,
        }
    }

    /// Starts a login and remembers it in the session. Returns the provider
    /// URL to redirect to.
    pub fn begin_login(&self, session: &mut Session) -> Url {
        let request = self.client.begin_login();
        session.set_pending(request.pending());
        request.authorization_url
    }

    /// Completes the login begun in this session. The pending login is
    /// consumed whether or not the exchange succeeds.
    ///
    /// # Errors
    ///
    /// Returns the exchange error from [`IdpClient::complete_login`].
    pub async fn complete_login(
        &self,
        session: &mut Session,
        params: &CallbackParams,
    ) -> Result<(), IdpError> {
        let pending = session.take_pending();
        let credential = self.client.complete_login(params, pending).await?;
        session.set_credential(credential);
        Ok(())
    }

    /// Drops the session's credential and any pending login.
    pub fn clear(&self, session: &mut Session) {
        session.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::IdentityProviderConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> Key {
        derive_cookie_key("test-secret")
    }

    fn config() -> Arc<SessionConfig> {
        Arc::new(SessionConfig::default())
    }

    fn credential(expires_at: Option<OffsetDateTime>) -> SessionCredential {
        SessionCredential {
            access_token: "token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at,
            scope: None,
        }
    }

    fn manager_for(server: &MockServer) -> SessionManager {
        let base = Url::parse(&server.uri()).unwrap();
        let provider = IdentityProviderConfig::google("cid")
            .with_token_endpoint(base.join("/token").unwrap())
            .with_userinfo_endpoint(base.join("/userinfo").unwrap());
        SessionManager::new(
            Arc::new(IdpClient::new(provider).unwrap()),
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        assert_eq!(
            derive_cookie_key("a").master(),
            derive_cookie_key("a").master()
        );
        assert_ne!(
            derive_cookie_key("a").master(),
            derive_cookie_key("b").master()
        );
    }

    #[test]
    fn test_session_persists_through_jar() {
        let mut session = Session::load(PrivateCookieJar::new(key()), config());
        assert!(session.credential().is_none());

        session.set_credential(credential(None));
        let jar = session.into_jar();

        let cookie = jar.get("netmon_session").unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let restored = Session::load(jar, config());
        assert_eq!(restored.credential(), Some(&credential(None)));
    }

    #[test]
    fn test_unreadable_cookie_yields_empty_session() {
        let jar = PrivateCookieJar::new(key()).add(Cookie::new("netmon_session", "not json"));
        let session = Session::load(jar, config());
        assert!(session.credential().is_none());
        assert!(session.pending().is_none());
    }

    #[test]
    fn test_take_pending_consumes() {
        let mut session = Session::load(PrivateCookieJar::new(key()), config());
        session.set_pending(PendingLogin {
            state: "s".to_string(),
            pkce_verifier: PkceVerifier::generate(),
        });
        assert!(session.take_pending().is_some());
        assert!(session.take_pending().is_none());
    }

    #[test]
    fn test_clear_removes_cookie() {
        let mut session = Session::load(PrivateCookieJar::new(key()), config());
        session.set_credential(credential(None));
        let jar = session.into_jar();

        let mut session = Session::load(jar, config());
        session.clear();
        let jar = session.into_jar();
        assert!(jar.get("netmon_session").is_none());
    }

    #[test]
    fn test_credential_expiry() {
        let now = OffsetDateTime::now_utc();
        assert!(!credential(None).is_expired_at(now));
        assert!(credential(Some(now)).is_expired_at(now));
        assert!(!credential(Some(now + time::Duration::minutes(5))).is_expired_at(now));
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let debug = format!("{:?}", credential(None));
        assert!(!debug.contains("\"token\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_callback_without_pending_login_is_rejected() {
        let manager = SessionManager::new(
            Arc::new(IdpClient::new(IdentityProviderConfig::google("cid")).unwrap()),
            SessionConfig::default(),
        );
        let mut session = manager.load(PrivateCookieJar::new(key()));
        let params = CallbackParams {
            code: Some("code".to_string()),
            state: Some("state".to_string()),
            ..CallbackParams::default()
        };

        let err = tokio_test::block_on(manager.complete_login(&mut session, &params)).unwrap_err();
        assert!(err.is_exchange_error());
        assert!(!manager.is_authenticated(&session));
    }

    #[tokio::test]
    async fn test_locally_expired_credential_skips_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let mut session = manager.load(PrivateCookieJar::new(key()));
        session.set_credential(credential(Some(
            OffsetDateTime::now_utc() - time::Duration::minutes(1),
        )));

        assert!(manager.is_authenticated(&session));
        let err = manager.current_identity(&mut session).await.unwrap_err();
        assert!(err.is_expired());
        assert!(session.credential().is_none());
    }

    #[tokio::test]
    async fn test_rejected_credential_is_cleared() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let mut session = manager.load(PrivateCookieJar::new(key()));
        session.set_credential(credential(None));

        let err = manager.current_identity(&mut session).await.unwrap_err();
        assert!(err.is_expired());
        assert!(!manager.is_authenticated(&session));
    }

    #[tokio::test]
    async fn test_current_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"email": "alice@example.com"})),
            )
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let mut session = manager.load(PrivateCookieJar::new(key()));
        session.set_credential(credential(None));

        let identity = manager.current_identity(&mut session).await.unwrap();
        assert_eq!(identity.email(), "alice@example.com");
        assert_eq!(identity.display_name(), "Anonymous");
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let mut session = manager.load(PrivateCookieJar::new(key()));
        assert!(!manager.is_authenticated(&session));

        let url = manager.begin_login(&mut session);
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();

        let params = CallbackParams {
            code: Some("code".to_string()),
            state: Some(state),
            ..CallbackParams::default()
        };
        manager.complete_login(&mut session, &params).await.unwrap();

        assert!(manager.is_authenticated(&session));
        assert!(session.pending().is_none());

        // A replayed callback finds no pending login.
        let err = manager.complete_login(&mut session, &params).await.unwrap_err();
        assert!(err.is_exchange_error());
    }
}
