//! Authenticated identities and the allow-list that gates data access.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Name shown when the provider's profile has none.
pub const ANONYMOUS: &str = "Anonymous";

/// The profile returned by the provider's userinfo endpoint.
///
/// Fetched fresh for every authenticated request and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Verified email address, when the provider shared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: Some(email.into()),
            name,
        }
    }

    /// The email address, or `""` when the profile has none.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    /// The name to greet the user with, `"Anonymous"` when absent.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(ANONYMOUS)
    }
}

/// Immutable set of email addresses allowed to read device records.
///
/// Configured entries are trimmed and empty entries dropped; lookups are
/// exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    emails: HashSet<String>,
}

impl AllowList {
    /// Returns `true` if `email` is allowed.
    #[must_use]
    pub fn contains(&self, email: &str) -> bool {
        !email.is_empty() && self.emails.contains(email)
    }

    /// Returns `true` if `identity`'s email is allowed. An identity without
    /// an email is never allowed.
    #[must_use]
    pub fn permits(&self, identity: &Identity) -> bool {
        identity
            .email
            .as_deref()
            .is_some_and(|email| self.contains(email))
    }

    /// Number of allowed addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.emails.len()
    }

    /// Returns `true` if nobody is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let emails = iter
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }
}
