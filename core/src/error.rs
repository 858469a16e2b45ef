//! Error types for the users API client.
//!
//! # Design
//! Every failure an API call can produce lands in one `ApiError` variant so
//! hosts can branch on a stable kind. `ServerError` keeps the raw status and
//! body for debugging; 401 is split out as `Unauthorized` because it also
//! ends the session. Transport failures that mean "no connectivity" become
//! `Offline`; everything else from the network layer is `Transport`.

use thiserror::Error;

use crate::http::TransportError;

/// Errors returned by `UserClient` and `UserApiClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request URL could not be formed from the base URL and path.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request was rejected locally before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The device has no usable network connection.
    #[error("no internet connection")]
    Offline,

    /// The server answered 401. The session has been cleared.
    #[error("unauthorized")]
    Unauthorized,

    /// The server returned a non-2xx status other than 401.
    #[error("server error: HTTP {status}")]
    ServerError { status: u16, body: String },

    /// A 2xx response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decoding(String),

    /// Any other network-layer failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Fieldless mirror of `ApiError` for hosts that only need the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUrl,
    InvalidRequest,
    Offline,
    Unauthorized,
    ServerError,
    Decoding,
    Transport,
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        if err.is_offline() {
            ApiError::Offline
        } else {
            ApiError::Transport(err.message)
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ApiError::Offline => ErrorKind::Offline,
            ApiError::Unauthorized => ErrorKind::Unauthorized,
            ApiError::ServerError { .. } => ErrorKind::ServerError,
            ApiError::Decoding(_) => ErrorKind::Decoding,
            ApiError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status carried by the error: the server's code for
    /// `ServerError`, 401 for `Unauthorized`.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ServerError { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::ServerError { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportErrorKind;

    #[test]
    fn server_error_exposes_status() {
        let err = ApiError::ServerError {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(err.to_string(), "server error: HTTP 500");
    }

    #[test]
    fn not_found_is_a_server_error() {
        let err = ApiError::ServerError {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!ApiError::Offline.is_not_found());
    }

    #[test]
    fn connectivity_failures_become_offline() {
        for kind in [
            TransportErrorKind::NotConnected,
            TransportErrorKind::ConnectionLost,
            TransportErrorKind::DataNotAllowed,
        ] {
            let err = ApiError::from(TransportError::new(kind, "down"));
            assert!(matches!(err, ApiError::Offline));
        }
    }

    #[test]
    fn other_transport_failures_keep_their_message() {
        let err = ApiError::from(TransportError::new(TransportErrorKind::Other, "tls handshake"));
        match err {
            ApiError::Transport(msg) => assert_eq!(msg, "tls handshake"),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[test]
    fn offline_has_no_status() {
        assert_eq!(ApiError::Offline.status(), None);
        assert_eq!(ApiError::Unauthorized.status(), Some(401));
    }
}
