//! # netmon-auth
//!
//! Authentication and authorization for the netmon gateway.
//!
//! This crate provides:
//! - An OAuth 2.0 authorization-code client (with PKCE and `state`) for an
//!   external identity provider, Google by default
//! - Encrypted cookie sessions holding the resulting credential
//! - The email allow-list deciding who may read device records
//!
//! ## Modules
//!
//! - [`config`] - Session cookie configuration
//! - [`federation`] - Identity provider configuration and client
//! - [`identity`] - Identities and the allow-list
//! - [`oauth`] - PKCE and `state` primitives
//! - [`session`] - Sessions and the session manager

pub mod config;
pub mod federation;
pub mod identity;
pub mod oauth;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use federation::{CallbackParams, IdentityProviderConfig, IdpClient, IdpError, LoginRequest};
pub use identity::{ANONYMOUS, AllowList, Identity};
pub use session::{
    PendingLogin, Session, SessionCredential, SessionManager, derive_cookie_key,
};

/// Re-exported so callers can name the cookie key without depending on
/// `axum-extra` directly.
pub use axum_extra::extract::cookie::Key;

/// Type alias for identity provider results.
pub type IdpResult<T> = Result<T, IdpError>;
