//! Error types for the decision pipeline.
//!
//! Every variant is terminal for the request it occurred in. The pipeline
//! maps all of them to a generic unauthorized response; the variant only
//! decides how the failure is logged and counted.

use thiserror::Error;

use crate::authn::AuthnType;

/// Result type alias using [`AuthzError`].
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors raised while deciding a request.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The inbound request did not describe a usable resource.
    #[error("failed to resolve object: {message}")]
    ObjectResolution {
        /// Human-readable error message.
        message: String,
    },

    /// The target URL cannot carry a session credential safely.
    #[error("target URL '{url}' has an insecure scheme '{scheme}', only the 'https' and 'wss' schemes are supported")]
    InsecureScheme {
        /// Offending target URL.
        url: String,
        /// Offending scheme.
        scheme: String,
    },

    /// The target is not covered by any configured domain.
    #[error("the url '{url}' doesn't appear to be on a protected domain")]
    NotProtectedDomain {
        /// Target URL.
        url: String,
    },

    /// The dynamic portal URL collaborator failed.
    #[error("failed to resolve portal URL: {message}")]
    PortalResolution {
        /// Human-readable error message.
        message: String,
    },

    /// A strategy failed and did not take over the unauthorized path.
    #[error("authentication strategy '{kind}' failed: {message}")]
    Authentication {
        /// Strategy that failed.
        kind: AuthnType,
        /// Human-readable error message.
        message: String,
    },

    /// The request deadline expired inside a collaborator call.
    #[error("request deadline exceeded during {stage}")]
    Cancelled {
        /// Pipeline stage that was interrupted.
        stage: &'static str,
    },

    /// The pipeline was assembled from invalid settings.
    #[error("invalid configuration: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },
}

impl AuthzError {
    /// Create an object resolution error.
    pub fn object_resolution(message: impl Into<String>) -> Self {
        Self::ObjectResolution {
            message: message.into(),
        }
    }

    /// Create an insecure scheme error.
    pub fn insecure_scheme(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::InsecureScheme {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    /// Create a not-a-protected-domain error.
    pub fn not_protected_domain(url: impl Into<String>) -> Self {
        Self::NotProtectedDomain { url: url.into() }
    }

    /// Create a portal resolution error.
    pub fn portal_resolution(message: impl Into<String>) -> Self {
        Self::PortalResolution {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(kind: AuthnType, message: impl Into<String>) -> Self {
        Self::Authentication {
            kind,
            message: message.into(),
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(stage: &'static str) -> Self {
        Self::Cancelled { stage }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the request deadline caused this error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Get the error category for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ObjectResolution { .. } => "object_resolution",
            Self::InsecureScheme { .. } => "insecure_scheme",
            Self::NotProtectedDomain { .. } => "not_protected_domain",
            Self::PortalResolution { .. } => "portal_resolution",
            Self::Authentication { .. } => "authentication",
            Self::Cancelled { .. } => "cancelled",
            Self::Config { .. } => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = AuthzError::object_resolution("missing header");
        assert_eq!(err.category(), "object_resolution");
        assert!(err.to_string().contains("missing header"));

        let err = AuthzError::insecure_scheme("http://a.example.com/", "http");
        assert_eq!(err.category(), "insecure_scheme");
        assert!(err.to_string().contains("'http'"));

        let err = AuthzError::not_protected_domain("https://other.com/");
        assert!(err.to_string().contains("protected domain"));

        let err = AuthzError::authentication(AuthnType::BearerToken, "unknown token");
        assert!(err.to_string().contains("bearer_token"));
    }

    #[test]
    fn test_is_cancelled() {
        assert!(AuthzError::cancelled("policy").is_cancelled());
        assert!(!AuthzError::config("bad").is_cancelled());
        assert_eq!(
            AuthzError::cancelled("object").to_string(),
            "request deadline exceeded during object"
        );
    }
}
