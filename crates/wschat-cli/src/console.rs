//! Console line reader.
//!
//! Turns stdin lines into [`ConsoleCommand`]s on a channel so the peer loops
//! can `select!` over console input alongside socket traffic.

use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffered console commands before the reader applies backpressure.
const CONSOLE_CHANNEL_CAPACITY: usize = 64;

/// Line that stops the running peer.
pub const EXIT_COMMAND: &str = "exit";

/// A single console instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forward this text to the active peer.
    Send(String),
    /// Stop the peer.
    Exit,
}

/// Classify one raw console line. Empty lines yield `None`.
pub fn classify_line(line: &str) -> Option<ConsoleCommand> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line == EXIT_COMMAND {
        Some(ConsoleCommand::Exit)
    } else if line.is_empty() {
        None
    } else {
        Some(ConsoleCommand::Send(line.to_string()))
    }
}

/// Spawn a task feeding classified lines from `lines` into a channel.
///
/// End of input is reported as [`ConsoleCommand::Exit`].
pub fn spawn_console<R>(mut lines: Lines<R>) -> mpsc::Receiver<ConsoleCommand>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CONSOLE_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        loop {
            let cmd = match lines.next_line().await {
                Ok(Some(line)) => match classify_line(&line) {
                    Some(cmd) => cmd,
                    None => continue,
                },
                Ok(None) => {
                    debug!("Console input closed");
                    ConsoleCommand::Exit
                }
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    ConsoleCommand::Exit
                }
            };
            let is_exit = cmd == ConsoleCommand::Exit;
            if tx.send(cmd).await.is_err() || is_exit {
                break;
            }
        }
    });
    rx
}
