//! Client peer with automatic reconnection.

use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::console::ConsoleCommand;
use crate::error::PeerError;
use crate::event::{ChatEvent, EventSender};
use crate::reconnect::ReconnectPolicy;

/// How a single connection ended.
enum SessionEnd {
    /// User asked to stop; do not reconnect.
    Stop,
    /// The server went away; reconnect.
    Lost,
}

/// Connecting side of the chat.
pub struct ChatClient {
    url: String,
    policy: ReconnectPolicy,
    events: EventSender,
}

impl ChatClient {
    pub const fn new(url: String, policy: ReconnectPolicy, events: EventSender) -> Self {
        Self {
            url,
            policy,
            events,
        }
    }

    /// Run the client with automatic reconnection.
    ///
    /// Returns `Ok` on `exit` or shutdown, and
    /// [`PeerError::ReconnectExhausted`] once the policy gives up.
    pub async fn run(
        &self,
        mut console: mpsc::Receiver<ConsoleCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PeerError> {
        let mut attempt: u32 = 0;
        info!(url = %self.url, "Connecting");

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let started = Instant::now();
            let error = match self.connect_and_run(&mut console, &mut shutdown).await {
                Ok(SessionEnd::Stop) => {
                    info!("Client stopped");
                    return Ok(());
                }
                Ok(SessionEnd::Lost) => None,
                Err(e) => Some(e),
            };

            // Reset backoff if the connection stayed up for a while
            if self.policy.resets_after(started.elapsed()) {
                attempt = 0;
            }

            if !self.policy.should_retry(attempt) {
                warn!(attempt, "Max reconnect attempts reached");
                return Err(PeerError::ReconnectExhausted { attempts: attempt });
            }

            let delay = self.policy.delay_for_attempt(attempt);
            match &error {
                Some(e) => warn!(error = %e, attempt, delay_ms = delay.as_millis(), "Reconnecting"),
                None => info!(attempt, delay_ms = delay.as_millis(), "Reconnecting"),
            }

            if self.wait_before_retry(delay, &mut console, &mut shutdown).await {
                info!("Client stopped during reconnect wait");
                return Ok(());
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Sleep for `delay` while still honouring console input.
    ///
    /// Returns `true` if the user asked to stop.
    async fn wait_before_retry(
        &self,
        delay: std::time::Duration,
        console: &mut mpsc::Receiver<ConsoleCommand>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let timer = sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                () = &mut timer => return false,
                cmd = console.recv() => match cmd {
                    Some(ConsoleCommand::Send(_)) => warn!("Not connected, message dropped"),
                    Some(ConsoleCommand::Exit) | None => return true,
                },
                _ = shutdown.changed() => return true,
            }
        }
    }

    /// Connect once and relay traffic until the connection ends.
    ///
    /// Console input and shutdown are honoured while the handshake is
    /// still pending; lines typed then are dropped.
    async fn connect_and_run(
        &self,
        console: &mut mpsc::Receiver<ConsoleCommand>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, PeerError> {
        // A stalled handshake must not block `exit` or shutdown.
        let connect = connect_async(self.url.as_str());
        tokio::pin!(connect);
        let ws = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok((ws, _response)) => break ws,
                    Err(e) => return Err(PeerError::Connect(e.to_string())),
                },
                cmd = console.recv() => match cmd {
                    Some(ConsoleCommand::Send(_)) => warn!("Not connected, message dropped"),
                    Some(ConsoleCommand::Exit) | None => return Ok(SessionEnd::Stop),
                },
                _ = shutdown.changed() => return Ok(SessionEnd::Stop),
            }
        };
        let addr = self
            .url
            .trim_start_matches("ws://")
            .trim_end_matches('/')
            .to_string();
        info!(%addr, "Connected");
        let _ = self.events.send(ChatEvent::ConnectedToServer { addr });

        let (mut sink, mut frames) = ws.split();
        let end = loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = self.events.send(ChatEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(_))) | None => break Ok(SessionEnd::Lost),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(PeerError::Transport(e.to_string())),
                },
                cmd = console.recv() => match cmd {
                    Some(ConsoleCommand::Send(line)) => {
                        if let Err(e) = sink.send(Message::text(line)).await {
                            break Err(PeerError::Transport(e.to_string()));
                        }
                    }
                    Some(ConsoleCommand::Exit) | None => {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            debug!(error = %e, "Close frame not delivered");
                        }
                        break Ok(SessionEnd::Stop);
                    }
                },
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break Ok(SessionEnd::Stop);
                }
            }
        };

        let _ = self.events.send(ChatEvent::ConnectionClosed);
        end
    }
}
