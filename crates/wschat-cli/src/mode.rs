//! Peer mode selection and address resolution.
//!
//! Besides the `server`/`client` subcommands, the binary accepts a single
//! prompt line of the form `1 <port>` / `server <port>` or
//! `2 <ip> <port>` / `client <ip> <port>`.

use std::net::{IpAddr, SocketAddr};

use wschat_core::config::ServerConfig;

use crate::error::ModeError;

/// Which side of the chat to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Listen for peers. Port 0 means the local default address.
    Server { port: u16 },
    /// Connect to a listening peer.
    Client { host: String, port: u16 },
}

/// Banner printed before reading a mode line.
pub const MODE_PROMPT: &str = "=== P2P WebSocket Chat ===\n\
Enter mode and parameters in one line:\n\
Server: 1 <port>\n\
Client: 2 <ip> <port>";

/// Parse a mode line such as `1 9000` or `client 10.0.0.2 9000`.
pub fn parse_mode_line(line: &str) -> Result<Mode, ModeError> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("server" | "1") => {
            let port = tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or(ModeError::InvalidPort)?;
            Ok(Mode::Server { port })
        }
        Some("client" | "2") => {
            let host = tokens.next().ok_or(ModeError::InvalidAddress)?;
            let port = tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or(ModeError::InvalidAddress)?;
            Ok(Mode::Client {
                host: host.to_string(),
                port,
            })
        }
        _ => Err(ModeError::UnknownMode),
    }
}

/// Resolve the server's listen address.
///
/// Port 0 binds the configured local address (loopback:8080 by default);
/// any other port binds `host_override` or the configured bind host.
pub fn resolve_bind_addr(
    port: u16,
    host_override: Option<&str>,
    config: &ServerConfig,
) -> Result<SocketAddr, ModeError> {
    let (host, port) = if port == 0 {
        (config.local_host.as_str(), config.local_port)
    } else {
        (host_override.unwrap_or(config.bind_host.as_str()), port)
    };
    let ip: IpAddr = host.parse().map_err(|_| ModeError::InvalidAddress)?;
    Ok(SocketAddr::new(ip, port))
}

/// WebSocket URL for a client connecting to `host:port`.
pub fn client_url(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("ws://[{v6}]:{port}/"),
        _ => format!("ws://{host}:{port}/"),
    }
}
