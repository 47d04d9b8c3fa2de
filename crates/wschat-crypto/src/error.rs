//! Crypto error types.

/// Errors from key-agreement operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid domain parameters: {0}")]
    InvalidParameters(String),

    #[error("Secure random source unavailable: {0}")]
    RandomSourceUnavailable(String),

    #[error("Peer public value out of range: {0}")]
    InvalidPeerValue(String),

    #[error("Peer public value is degenerate (1 or p-1)")]
    DegeneratePeerValue,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}
