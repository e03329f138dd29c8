//! Error types for the platform crate.
//!
//! Client methods return `Report<PlatformError>` so callers can attach
//! context while the original failure stays visible.

use std::fmt;

/// Errors from talking to the workflow platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Client configuration is unusable.
    InvalidConfig { reason: String },
    /// The request never reached the platform.
    ConnectionFailed { endpoint: String, reason: String },
    /// The platform did not answer in time.
    Timeout { endpoint: String },
    /// The API key was rejected.
    Unauthorized { endpoint: String },
    /// The addressed resource does not exist.
    NotFound { resource: String },
    /// The platform answered with a non-success status.
    RequestFailed {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response body could not be decoded.
    InvalidResponse { endpoint: String, reason: String },
}

impl PlatformError {
    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::RequestFailed { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => {
                write!(f, "invalid platform configuration: {reason}")
            }
            Self::ConnectionFailed { endpoint, reason } => {
                write!(f, "failed to reach {endpoint}: {reason}")
            }
            Self::Timeout { endpoint } => {
                write!(f, "request to {endpoint} timed out")
            }
            Self::Unauthorized { endpoint } => {
                write!(f, "platform rejected the API key for {endpoint}")
            }
            Self::NotFound { resource } => {
                write!(f, "{resource} not found on the platform")
            }
            Self::RequestFailed {
                endpoint,
                status,
                body,
            } => {
                write!(f, "{endpoint} returned {status}: {body}")
            }
            Self::InvalidResponse { endpoint, reason } => {
                write!(f, "unexpected response from {endpoint}: {reason}")
            }
        }
    }
}

impl std::error::Error for PlatformError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_display_keeps_body() {
        let err = PlatformError::RequestFailed {
            endpoint: "/api/v1/workflows".to_string(),
            status: 400,
            body: "request/body/nodes must be array".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("nodes must be array"));
    }

    #[test]
    fn transient_classification() {
        assert!(PlatformError::Timeout { endpoint: "x".into() }.is_transient());
        assert!(
            PlatformError::RequestFailed {
                endpoint: "x".into(),
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!PlatformError::NotFound { resource: "workflow 1".into() }.is_transient());
    }
}
