//! Error types for the crypto/model layer.

use thiserror::Error;

/// Failures that can occur while sealing, opening, or verifying an envelope.
///
/// Every variant here is "uniform" in the sense that it never reveals *why*
/// an authentication check failed beyond the coarse category — callers must
/// not branch on the distinction between a bad key and a corrupted payload.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD tag, MAC, or signature verification failed, or a ciphertext was
    /// structurally malformed. Never retried by the caller.
    #[error("integrity check failed")]
    Integrity,

    /// A value could not be serialized/deserialized into its wire shape
    /// (wrong length, bad version byte, non-canonical encoding).
    #[error("encoding error")]
    Encoding,

    /// The entity carries a `version` this build does not understand.
    #[error("unknown scheme version: {0}")]
    UnknownVersion(u8),
}

pub type Result<T> = core::result::Result<T, CryptoError>;
