//! Session cookie configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the encrypted session cookie.
///
/// # Example (TOML)
///
/// ```toml
/// [session]
/// cookie_name = "netmon_session"
/// secure = true
/// max_age = "7d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// Set the `Secure` attribute. Enable when served over HTTPS.
    pub secure: bool,

    /// Browser-side lifetime of the cookie.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "netmon_session".to_string(),
            secure: false,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Errors in auth configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl SessionConfig {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unusable cookie name or a
    /// zero lifetime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name_ok = !self.cookie_name.is_empty()
            && self
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !name_ok {
            return Err(ConfigError::invalid_value(
                "session.cookie_name",
                "must be non-empty and contain only [A-Za-z0-9_-]",
            ));
        }
        if self.max_age.is_zero() {
            return Err(ConfigError::invalid_value(
                "session.max_age",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Cookie lifetime as a `time::Duration`.
    #[must_use]
    pub fn cookie_max_age(&self) -> time::Duration {
        time::Duration::try_from(self.max_age).unwrap_or(time::Duration::MAX)
    }
}
