//! wschat CLI Library
//!
//! Peer-to-peer chat over WebSocket: one side listens, the other connects,
//! and console lines flow between them.

pub mod client;
pub mod console;
pub mod error;
pub mod event;
pub mod mode;
pub mod public_ip;
pub mod reconnect;
pub mod server;

pub use client::ChatClient;
pub use console::{ConsoleCommand, spawn_console};
pub use error::{DiscoveryError, ModeError, PeerError};
pub use event::ChatEvent;
pub use mode::Mode;
pub use reconnect::ReconnectPolicy;
pub use server::ChatServer;
