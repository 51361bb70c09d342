//! Error taxonomy for the sync engine. Every fallible operation in this
//! crate returns one of these kinds, never a raw transport or crypto error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A ciphertext, MAC, signature, or revision `uid` failed verification.
    /// Never retried.
    #[error("integrity check failed: {0}")]
    Integrity(#[from] vsync_crypto::CryptoError),

    /// An uploaded batch/transaction was rejected because the server's
    /// etag or stoken had already moved past what the client assumed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The session token is missing, expired, or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to perform this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The request never reached the server, or its response never came
    /// back — safe to retry.
    #[error("network error: {0}")]
    Network(String),

    /// The server responded but signaled it is overloaded or unavailable
    /// (502/503/504) — safe to retry with backoff.
    #[error("temporary server error: {0}")]
    TemporaryServer(String),

    /// The server responded with an unexpected 5xx that isn't known to be
    /// transient.
    #[error("server error: {0}")]
    Server(String),

    /// Any other non-2xx response not covered by a more specific variant.
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },

    /// The caller violated an API invariant (e.g. accepted an invitation
    /// addressed to a different identity). Indicates a client bug, not a
    /// transient condition.
    #[error("programming error: {0}")]
    Programming(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map an HTTP response into the matching error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Error::Unauthorized(message),
            403 => Error::PermissionDenied(message),
            404 => Error::NotFound(message),
            409 => Error::Conflict(message),
            502 | 503 | 504 => Error::TemporaryServer(message),
            500..=599 => Error::Server(message),
            _ => Error::Http { status, message },
        }
    }

    pub fn programming(msg: impl Into<String>) -> Self {
        Error::Programming(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(Error::from_status(401, "x"), Error::Unauthorized(_)));
        assert!(matches!(Error::from_status(403, "x"), Error::PermissionDenied(_)));
        assert!(matches!(Error::from_status(404, "x"), Error::NotFound(_)));
        assert!(matches!(Error::from_status(409, "x"), Error::Conflict(_)));
        assert!(matches!(Error::from_status(503, "x"), Error::TemporaryServer(_)));
        assert!(matches!(Error::from_status(500, "x"), Error::Server(_)));
        assert!(matches!(Error::from_status(418, "x"), Error::Http { status: 418, .. }));
    }
}
