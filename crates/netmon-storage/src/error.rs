//! Error types for record retrieval and typed attribute decoding.

/// Errors raised while converting tagged attribute values into native values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The attribute value carries a type tag this decoder does not know.
    #[error("Unknown type tag: {tag}")]
    UnknownTypeTag {
        /// The offending tag.
        tag: String,
    },

    /// The payload under a known tag has the wrong shape or content.
    #[error("Malformed {tag} value: {message}")]
    MalformedValue {
        /// The tag whose payload is malformed.
        tag: String,
        /// Description of the problem.
        message: String,
    },

    /// The attribute value is not an object with exactly one type tag.
    #[error("Invalid attribute value: {message}")]
    InvalidShape {
        /// Description of the problem.
        message: String,
    },

    /// Decoding failed for a named attribute of a record.
    #[error("Attribute '{attribute}': {source}")]
    Attribute {
        /// Name of the attribute being decoded.
        attribute: String,
        /// The underlying decoding error.
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Creates an `UnknownTypeTag` error.
    #[must_use]
    pub fn unknown_type_tag(tag: impl Into<String>) -> Self {
        Self::UnknownTypeTag { tag: tag.into() }
    }

    /// Creates a `MalformedValue` error.
    #[must_use]
    pub fn malformed(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedValue {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Creates an `InvalidShape` error.
    #[must_use]
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape {
            message: message.into(),
        }
    }

    /// Wraps this error with the name of the attribute it occurred in.
    #[must_use]
    pub fn in_attribute(self, attribute: impl Into<String>) -> Self {
        Self::Attribute {
            attribute: attribute.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping attribute context.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Attribute { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns `true` if the root cause is an unrecognized type tag.
    #[must_use]
    pub fn is_unknown_tag(&self) -> bool {
        matches!(self.root_cause(), Self::UnknownTypeTag { .. })
    }
}

/// Errors that can occur while fetching device records.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store could not serve the request.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A record returned by the store could not be decoded.
    #[error("Record decoding failed: {0}")]
    Decode(#[from] DecodeError),
}

impl StorageError {
    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns `true` if the store itself failed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` if a record failed to decode.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::unavailable(format!("HTTP request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::unknown_type_tag("XS");
        assert_eq!(err.to_string(), "Unknown type tag: XS");

        let err = DecodeError::malformed("N", "not a number").in_attribute("uptime");
        assert_eq!(
            err.to_string(),
            "Attribute 'uptime': Malformed N value: not a number"
        );

        let err = StorageError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_root_cause_skips_attribute_context() {
        let err = DecodeError::unknown_type_tag("XS")
            .in_attribute("inner")
            .in_attribute("outer");
        assert!(err.is_unknown_tag());
        assert_eq!(err.root_cause(), &DecodeError::unknown_type_tag("XS"));

        let err = DecodeError::invalid_shape("empty").in_attribute("x");
        assert!(!err.is_unknown_tag());
    }

    #[test]
    fn test_storage_error_predicates() {
        assert!(StorageError::unavailable("x").is_unavailable());
        assert!(!StorageError::unavailable("x").is_decode_error());

        let err = StorageError::from(DecodeError::unknown_type_tag("XS"));
        assert!(err.is_decode_error());
        assert!(!err.is_unavailable());
    }
}
