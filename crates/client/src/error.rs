//! Client error types

use thiserror::Error;

/// Errors surfaced by the session client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error below the HTTP status line
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The session could not be recovered: the token refresh failed and the
    /// stored credentials have been cleared
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Terminal authentication failure (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from a terminal HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether this error means the session itself ended, as opposed to a
    /// single request failing
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_statuses_to_variants() {
        let error = ClientError::from_status(reqwest::StatusCode::UNAUTHORIZED, "nope".into());
        assert!(matches!(error, ClientError::AuthenticationFailed(_)));

        let error = ClientError::from_status(reqwest::StatusCode::NOT_FOUND, "gone".into());
        assert!(matches!(error, ClientError::NotFound(_)));

        let error = ClientError::from_status(reqwest::StatusCode::BAD_GATEWAY, "bad".into());
        assert!(matches!(error, ClientError::ServerError { status: 502, .. }));
    }

    #[test]
    fn session_expiry_is_distinguishable() {
        assert!(ClientError::SessionExpired("refresh rejected".into()).is_session_expired());
        assert!(!ClientError::AuthenticationFailed("401".into()).is_session_expired());
    }
}
