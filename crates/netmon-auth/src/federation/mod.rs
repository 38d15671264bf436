//! External identity provider federation.
//!
//! - [`provider`] - provider endpoints, scopes and client credentials
//! - [`client`] - the authorization-code exchange and profile lookup
//! - [`error`] - failures of either step

pub mod client;
pub mod error;
pub mod provider;

pub use client::{CallbackParams, IdpClient, LoginRequest};
pub use error::IdpError;
pub use provider::IdentityProviderConfig;
