use crate::api::{ApiError, NETWORK_ERROR_MESSAGE};
use thiserror::Error;

/// Failures a form boundary can observe. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    /// A required field was left empty; no request was sent.
    #[error("{0}")]
    Validation(String),
    /// The server rejected the request with a 4xx and a message.
    #[error("{0}")]
    Auth(String),
    /// The server failed (5xx or undecodable body).
    #[error("{0}")]
    Server(String),
    /// The request never completed. The detail is for logs only.
    #[error("{}", NETWORK_ERROR_MESSAGE)]
    Network(String),
}

impl PortalError {
    /// Short tag for the event log
    pub fn kind(&self) -> &'static str {
        match self {
            PortalError::Validation(_) => "validation",
            PortalError::Auth(_) => "auth",
            PortalError::Server(_) => "server",
            PortalError::Network(_) => "network",
        }
    }
}

impl From<ApiError> for PortalError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(detail) => PortalError::Network(detail),
            ApiError::Unauthorized { message } => PortalError::Auth(message),
            ApiError::Server { status, message } if status < 500 => PortalError::Auth(message),
            ApiError::Server { message, .. } => PortalError::Server(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_hides_detail() {
        let err = PortalError::from(ApiError::Network("dns lookup failed".to_string()));
        assert_eq!(err.to_string(), NETWORK_ERROR_MESSAGE);
        assert_eq!(err.kind(), "network");
    }

    #[test]
    fn test_server_text_is_verbatim() {
        let err = PortalError::from(ApiError::Server {
            status: 400,
            message: "User account is inactive".to_string(),
        });
        assert_eq!(err, PortalError::Auth("User account is inactive".to_string()));
        assert_eq!(err.to_string(), "User account is inactive");

        let err = PortalError::from(ApiError::Server {
            status: 500,
            message: "database is locked".to_string(),
        });
        assert_eq!(err.kind(), "server");
        assert_eq!(err.to_string(), "database is locked");
    }
}
