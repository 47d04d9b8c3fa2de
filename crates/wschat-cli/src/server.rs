//! Server peer: accepts WebSocket connections and chats with the most
//! recent one.
//!
//! Every accepted connection replaces the active peer. Console lines go to
//! the active peer only; a connection that closes clears the active slot if
//! it still owns it. On exit every open connection, replaced or not, gets a
//! Close frame.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::console::ConsoleCommand;
use crate::error::PeerError;
use crate::event::{ChatEvent, EventSender};

/// Handle to the connection currently receiving console lines.
#[derive(Debug)]
struct ActivePeer {
    id: u64,
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Message>,
}

type ActiveSlot = Arc<Mutex<Option<ActivePeer>>>;

/// How long connections get to deliver their Close frame on exit.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Listening side of the chat.
pub struct ChatServer {
    listener: TcpListener,
    events: EventSender,
}

impl ChatServer {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr, events: EventSender) -> Result<Self, PeerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PeerError::Bind(format!("{addr}: {e}")))?;
        Ok(Self { listener, events })
    }

    /// Address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, PeerError> {
        self.listener
            .local_addr()
            .map_err(|e| PeerError::Bind(e.to_string()))
    }

    /// Accept peers and forward console lines until `exit` or shutdown.
    pub async fn run(
        self,
        mut console: mpsc::Receiver<ConsoleCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PeerError> {
        let active: ActiveSlot = Arc::new(Mutex::new(None));
        let (close_tx, close_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        let mut next_id: u64 = 0;
        info!(addr = %self.local_addr()?, "Server running");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        next_id += 1;
                        connections.spawn(handle_connection(
                            stream,
                            remote,
                            next_id,
                            Arc::clone(&active),
                            self.events.clone(),
                            close_rx.clone(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        warn!(error = %e, "Connection task failed");
                    }
                }
                cmd = console.recv() => match cmd {
                    Some(ConsoleCommand::Send(line)) => {
                        let guard = active.lock().await;
                        match guard.as_ref() {
                            Some(peer) => {
                                if peer.outbound.send(Message::text(line)).is_err() {
                                    warn!(remote = %peer.remote, "Active peer writer closed, message dropped");
                                }
                            }
                            None => warn!("No connected peer, message dropped"),
                        }
                    }
                    Some(ConsoleCommand::Exit) | None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        active.lock().await.take();
        let _ = close_tx.send(true);
        let drained = tokio::time::timeout(CLOSE_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(open = connections.len(), "Connections did not close in time, aborting");
            connections.shutdown().await;
        }
        info!("Server stopped");
        Ok(())
    }
}

/// Run one accepted connection until it closes or the server exits.
async fn handle_connection(
    stream: TcpStream,
    remote: SocketAddr,
    id: u64,
    active: ActiveSlot,
    events: EventSender,
    mut closing: watch::Receiver<bool>,
) {
    let ws = tokio::select! {
        handshake = accept_async(stream) => match handshake {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%remote, error = %e, "WebSocket handshake failed");
                return;
            }
        },
        _ = closing.changed() => return,
    };
    let (mut sink, mut frames) = ws.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    {
        let mut slot = active.lock().await;
        if let Some(previous) = slot.replace(ActivePeer {
            id,
            remote,
            outbound: outbound.clone(),
        }) {
            info!(previous = %previous.remote, %remote, "Active peer replaced");
        }
    }
    info!(%remote, id, "Client connected");
    let _ = events.send(ChatEvent::PeerConnected {
        remote: remote.to_string(),
    });

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = msg.is_close();
            if let Err(e) = sink.send(msg).await {
                debug!(%remote, error = %e, "Write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let server_closing = loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ChatEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(_))) | None => break false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%remote, error = %e, "Read failed");
                    break false;
                }
            },
            _ = closing.changed() => break true,
        }
    };

    {
        let mut slot = active.lock().await;
        if slot.as_ref().is_some_and(|peer| peer.id == id) {
            *slot = None;
        }
    }
    if server_closing {
        // The writer stops after delivering the Close frame.
        let _ = outbound.send(Message::Close(None));
        let _ = writer.await;
    } else {
        writer.abort();
    }
    info!(%remote, id, "Client disconnected");
    let _ = events.send(ChatEvent::PeerDisconnected {
        remote: remote.to_string(),
    });
}
