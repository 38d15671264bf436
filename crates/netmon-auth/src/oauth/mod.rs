//! OAuth 2.0 client primitives.
//!
//! - [`pkce`] - verifier and S256 challenge
//! - [`state`] - the anti-forgery `state` parameter

pub mod pkce;
pub mod state;

pub use pkce::{PkceChallenge, PkceError, PkceVerifier};
pub use state::{generate_state, states_match};
