//! Entry point for `udp-file-transfer`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use udp_file_transfer::config::{
    DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_DATAGRAM_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RECEIVE_DIR,
};
use udp_file_transfer::{CancelToken, Client, ServerConfig, Socket, TransferConfig};

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive files, one transfer at a time, until interrupted.
    Server {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Directory received files are written to.
        #[arg(short, long, default_value = DEFAULT_RECEIVE_DIR)]
        receive_dir: PathBuf,
    },
    /// Send one file to a server.
    Client {
        /// Server address (e.g. 127.0.0.1:9000 or host:port).
        #[arg(short, long)]
        server: String,
        /// File to send.
        #[arg(short, long)]
        file: PathBuf,
        /// Size of every data datagram, header included.
        #[arg(short, long, default_value_t = DEFAULT_DATAGRAM_SIZE)]
        datagram_size: usize,
        /// Milliseconds to wait for each ACK before resending.
        #[arg(long, default_value_t = DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64)]
        timeout_ms: u64,
        /// Resends of one datagram before giving up.
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupted");
                cancel.cancel();
            }
        });
    }

    match cli.mode {
        Mode::Server { bind, receive_dir } => {
            udp_file_transfer::serve(bind, ServerConfig { receive_dir }, cancel)
                .await
                .with_context(|| format!("server on {bind} failed"))?;
        }
        Mode::Client {
            server,
            file,
            datagram_size,
            timeout_ms,
            max_retries,
        } => {
            let peer = resolve(&server).await?;
            let config = TransferConfig {
                datagram_size,
                attempt_timeout: Duration::from_millis(timeout_ms),
                max_retries,
            };
            let socket = Socket::bind_for(peer)
                .await
                .context("binding client socket")?;
            let report = Client::new(socket, peer, config)?
                .with_cancel(cancel)
                .send_file(&file)
                .await
                .with_context(|| format!("sending {}", file.display()))?;
            println!("{report}");
        }
    }
    Ok(())
}

async fn resolve(server: &str) -> Result<SocketAddr> {
    let addrs = tokio::net::lookup_host(server)
        .await
        .with_context(|| format!("resolving {server}"))?;
    match pick_address(addrs) {
        Some(addr) => Ok(addr),
        None => bail!("{server} did not resolve to any address"),
    }
}

/// Prefer IPv4: the server's default bind is `0.0.0.0`, which never sees
/// traffic sent to `::1` when `localhost` resolves to both.
fn pick_address(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let mut first = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        first.get_or_insert(addr);
    }
    first
}
