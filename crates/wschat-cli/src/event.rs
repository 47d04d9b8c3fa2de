//! Chat events reported by the peers.
//!
//! The peers never print; they emit events and the binary renders them.

use std::fmt;

use tokio::sync::mpsc;

/// Sender half used by peers to report events.
pub type EventSender = mpsc::UnboundedSender<ChatEvent>;

/// Something the user should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Server side: a peer connected and became the active peer.
    PeerConnected { remote: String },
    /// Server side: the peer on this connection went away.
    PeerDisconnected { remote: String },
    /// Client side: the connection to the server is open.
    ConnectedToServer { addr: String },
    /// Client side: the connection to the server closed.
    ConnectionClosed,
    /// Text received from the other side.
    Message(String),
}

impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerConnected { remote } => write!(f, "[state] Client connected: {remote}"),
            Self::PeerDisconnected { remote } => {
                write!(f, "[state] Client disconnected: {remote}")
            }
            Self::ConnectedToServer { addr } => write!(f, "[state] Connected to the server {addr}"),
            Self::ConnectionClosed => write!(f, "[state] Connection is closed."),
            Self::Message(text) => write!(f, "[peer] {text}"),
        }
    }
}
