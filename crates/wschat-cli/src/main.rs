//! wschat CLI
//!
//! Peer-to-peer WebSocket chat. Run `wschat server` on one machine and
//! `wschat client` on the other, or start without a subcommand and pick the
//! mode interactively.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use wschat_cli::mode::{self, MODE_PROMPT, Mode};
use wschat_cli::public_ip::discover_public_ip;
use wschat_cli::{ChatClient, ChatEvent, ChatServer, ReconnectPolicy, spawn_console};
use wschat_core::Config;
use wschat_core::config::load_config;

/// How long to wait for queued chat events to print on exit.
const PRINTER_DRAIN: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "wschat")]
#[command(version, about = "Peer-to-peer WebSocket chat", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "WSCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "warn")
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for a peer
    Server {
        /// Port to listen on (0 = local default address)
        #[arg(short, long, default_value_t = 0)]
        port: u16,

        /// Host to bind when a non-zero port is given
        #[arg(long)]
        host: Option<String>,

        /// Look up and print this host's public IP
        #[arg(long)]
        discover_ip: bool,
    },
    /// Connect to a listening peer
    Client {
        /// Server IP or hostname
        #[arg(long)]
        host: String,

        /// Server port
        #[arg(short, long)]
        port: u16,

        /// Give up after this many reconnect attempts
        #[arg(long, env = "WSCHAT_MAX_RECONNECT_ATTEMPTS")]
        max_attempts: Option<u32>,
    },
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let result = run(Cli::parse()).await;
    // A pending stdin read cannot be cancelled and would keep the runtime
    // alive, so leave explicitly.
    if let Err(e) = result {
        error!(error = %e, "wschat failed");
        eprintln!("[Error] {e:#}");
        std::process::exit(1);
    }
    std::process::exit(0);
}

#[allow(clippy::print_stdout)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.log_json {
        config.logging.json = true;
    }

    let level = &config.logging.level;
    wschat_core::tracing_init::init_tracing(
        &format!("wschat_cli={level},wschat_core={level}"),
        config.logging.json,
    );
    info!(version = env!("CARGO_PKG_VERSION"), "Starting wschat");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let (mode, host_override, discover_ip) = match cli.command {
        Some(Command::Server {
            port,
            host,
            discover_ip,
        }) => (Mode::Server { port }, host, discover_ip),
        Some(Command::Client {
            host,
            port,
            max_attempts,
        }) => {
            if max_attempts.is_some() {
                config.client.max_reconnect_attempts = max_attempts;
            }
            (Mode::Client { host, port }, None, false)
        }
        None => {
            println!("{MODE_PROMPT}");
            let line = lines.next_line().await?.unwrap_or_default();
            match mode::parse_mode_line(&line) {
                Ok(mode) => (mode, None, false),
                Err(e) => {
                    println!("[Error] {e}");
                    return Ok(());
                }
            }
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ChatEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{event}");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let console = spawn_console(lines);

    match mode {
        Mode::Server { port } => {
            let addr = mode::resolve_bind_addr(port, host_override.as_deref(), &config.server)?;
            let server = ChatServer::bind(addr, events_tx).await?;
            if discover_ip {
                report_public_ip(&config, server.local_addr()?.port()).await;
            }
            println!("[Server running on {}] Type 'exit' to stop", server.local_addr()?);
            server.run(console, shutdown_rx).await?;
            println!("[Server stopped]");
        }
        Mode::Client { host, port } => {
            let url = mode::client_url(&host, port);
            println!("[client] Connecting to {url}");
            println!("Enter the messages (use exit to close connection)");
            let client = ChatClient::new(
                url,
                ReconnectPolicy::from_config(&config.client),
                events_tx,
            );
            client.run(console, shutdown_rx).await?;
        }
    }

    // Connection tasks may still hold event senders; give the printer a
    // moment to drain what is already queued.
    let _ = tokio::time::timeout(PRINTER_DRAIN, printer).await;
    Ok(())
}

/// Print where peers can reach this server, if the lookup succeeds.
#[allow(clippy::print_stdout)]
async fn report_public_ip(config: &Config, port: u16) {
    match discover_public_ip(&config.discovery).await {
        Ok(ip) => {
            info!(%ip, port, "Public IP discovered");
            println!("[state] Public address: {ip}:{port}");
        }
        Err(e) => warn!(error = %e, "Public IP discovery failed"),
    }
}
