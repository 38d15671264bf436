//! The access gateway: login flow routes and the guarded device listing.
//!
//! Every request to `/` is classified from scratch into an [`AccessState`].
//! Only an allow-listed identity ever reaches the record store.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use netmon_auth::{CallbackParams, Identity, IdpError, Session};
use netmon_storage::fetch_devices;

use crate::error::GatewayError;
use crate::pages;
use crate::server::AppState;

const NO_CACHE_HEADERS: [(HeaderName, &str); 3] = [
    (
        header::CACHE_CONTROL,
        "no-store, no-cache, must-revalidate, max-age=0",
    ),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "-1"),
];

/// Where a request stands with respect to authentication and authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    Unauthenticated,
    CredentialExpired,
    AuthenticatedUnauthorized(Identity),
    AuthenticatedAuthorized(Identity),
}

/// Classifies the session. Contacts the provider only when the session
/// holds a credential; never touches the record store.
pub async fn resolve_access(
    state: &AppState,
    session: &mut Session,
) -> Result<AccessState, IdpError> {
    if !state.sessions.is_authenticated(session) {
        return Ok(AccessState::Unauthenticated);
    }

    let identity = match state.sessions.current_identity(session).await {
        Ok(identity) => identity,
        Err(IdpError::CredentialExpired) => return Ok(AccessState::CredentialExpired),
        Err(e) => return Err(e),
    };

    if state.allow_list.permits(&identity) {
        Ok(AccessState::AuthenticatedAuthorized(identity))
    } else {
        Ok(AccessState::AuthenticatedUnauthorized(identity))
    }
}

pub async fn index(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<Response, GatewayError> {
    let mut session = state.sessions.load(jar);
    let access = resolve_access(&state, &mut session).await?;

    let response = match access {
        AccessState::Unauthenticated => (session, Html(pages::unauthenticated())).into_response(),
        AccessState::CredentialExpired => {
            tracing::info!("Credential expired, asking for a new login");
            (session, Html(pages::expired())).into_response()
        }
        AccessState::AuthenticatedUnauthorized(identity) => {
            tracing::info!(email = identity.email(), "Identity not on the allow-list");
            let page = pages::unauthorized(identity.display_name(), &state.gateway.contact_email);
            (session, Html(page)).into_response()
        }
        AccessState::AuthenticatedAuthorized(identity) => {
            let devices = fetch_devices(state.store.as_ref(), &state.gateway.collection).await?;
            tracing::info!(
                email = identity.email(),
                devices = devices.len(),
                "Serving device records"
            );
            (session, Json(devices)).into_response()
        }
    };
    Ok(response)
}

pub async fn login(State(state): State<AppState>, jar: PrivateCookieJar) -> impl IntoResponse {
    let mut session = state.sessions.load(jar);
    let url = state.sessions.begin_login(&mut session);
    (session, NO_CACHE_HEADERS, Redirect::to(url.as_str()))
}

pub async fn authorized(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: PrivateCookieJar,
) -> Response {
    if provider != state.sessions.client().provider_id() {
        return StatusCode::NOT_FOUND.into_response();
    }

    // The pending login is consumed either way; a credential from an
    // earlier login survives a failed callback.
    let mut session = state.sessions.load(jar);
    match state.sessions.complete_login(&mut session, &params).await {
        Ok(()) => tracing::info!(provider = %provider, "User logged in"),
        Err(e) => tracing::warn!(provider = %provider, error = %e, "Login failed"),
    }
    (session, Redirect::to("/")).into_response()
}

pub async fn logout(State(state): State<AppState>, jar: PrivateCookieJar) -> impl IntoResponse {
    let mut session = state.sessions.load(jar);
    state.sessions.clear(&mut session);
    (session, Redirect::to("/"))
}
