//! Error types for the chat peers.

/// Errors from running a server or client peer.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Errors from public-IP discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Discovery endpoint returned status {0}")]
    Status(u16),

    #[error("Discovery endpoint returned a non-address body: {0:?}")]
    InvalidBody(String),
}

/// Errors from parsing the interactive mode line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("Invalid port")]
    InvalidPort,

    #[error("Invalid IP or port")]
    InvalidAddress,

    #[error("Unknown mode")]
    UnknownMode,
}
