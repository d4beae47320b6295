// SPDX-License-Identifier: Apache-2.0

//! Error types for connection configuration resolution

use thiserror::Error;

/// Result type for configuration and metadata operations
pub type BigQueryResult<T> = Result<T, BigQueryError>;

/// Errors raised while turning a connection string into a validated configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BigQueryError {
    /// The connection string is absent, lacks the scheme prefix, or fits neither dialect
    #[error("malformed connection string: {0}")]
    MalformedConnectionString(String),

    /// A required property was not supplied by the URL or the overrides
    #[error("missing required property '{property}' for {context}")]
    MissingRequiredProperty { property: String, context: String },

    /// A typed property could not be parsed
    #[error("invalid value '{value}' for property '{property}': {reason}")]
    InvalidPropertyValue {
        property: String,
        value: String,
        reason: String,
    },

    /// The authentication mode token is not one of the known modes
    #[error("unsupported authentication mode: {0}")]
    UnsupportedAuthMode(String),

    /// A legacy `OAuthType` code that is recognized but deliberately rejected
    #[error("unsupported legacy authentication type OAuthType={code}: {reason}")]
    UnsupportedLegacyAuthCode { code: String, reason: String },
}

impl BigQueryError {
    pub(crate) fn missing(property: impl Into<String>, context: impl Into<String>) -> Self {
        BigQueryError::MissingRequiredProperty {
            property: property.into(),
            context: context.into(),
        }
    }

    pub(crate) fn invalid(
        property: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        BigQueryError::InvalidPropertyValue {
            property: property.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Name of the property the error refers to, when there is one
    pub fn property(&self) -> Option<&str> {
        match self {
            BigQueryError::MissingRequiredProperty { property, .. }
            | BigQueryError::InvalidPropertyValue { property, .. } => Some(property),
            BigQueryError::UnsupportedLegacyAuthCode { .. } => Some("OAuthType"),
            BigQueryError::MalformedConnectionString(_)
            | BigQueryError::UnsupportedAuthMode(_) => None,
        }
    }
}
