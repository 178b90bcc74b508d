//! Sending side of a transfer.
//!
//! [`Client`] drives one [`Sender`] per file through a linear sequence of
//! stop-and-wait round trips against a fixed peer:
//!
//! ```text
//!  ANNOUNCE ─▶ AWAIT_ACK ─▶ SEND_CHUNK ─▶ AWAIT_ACK ─▶ … ─▶ AWAIT_ACK_FINAL ─▶ DONE
//! ```
//!
//! The call returns only once the EOF segment is acknowledged or the session
//! fails (local I/O error, exhausted retries, cancellation).
//!
//! ACKs are taken from any source address.  A server bound to a wildcard
//! address replies from whichever local address routes back to us, which
//! need not be the address we sent to.

use std::io;
use std::net::SocketAddr;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::packet::{decode_ack, Announcement};
use crate::sender::Sender;
use crate::session::{CancelToken, TransferReport, TransferStats};
use crate::socket::{recv_until, Socket, Transport};
use crate::state::SenderState;
use crate::timer::{RetransmitTimer, RetryDecision};

/// Bind an ephemeral socket, send `path` to `server`, and close the socket.
pub async fn send_file(
    server: SocketAddr,
    path: impl AsRef<Path>,
    config: TransferConfig,
) -> Result<TransferReport> {
    let socket = Socket::bind_for(server).await.map_err(TransferError::Socket)?;
    Client::new(socket, server, config)?.send_file(path).await
}

/// A file sender bound to one transport and one peer.
pub struct Client<T> {
    transport: T,
    peer: SocketAddr,
    config: TransferConfig,
    cancel: CancelToken,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, peer: SocketAddr, config: TransferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            peer,
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Stop the session at the next attempt boundary once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Transfer the file at `path`; its bare file name is announced.
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<TransferReport> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidPath(path.to_path_buf()))?
            .to_owned();

        let file = File::open(path).await.map_err(TransferError::Io)?;
        let file_len = file.metadata().await.map_err(TransferError::Io)?.len();

        log::info!(
            "[client] sending {} ({file_len} bytes) to {} with datagram size {}",
            path.display(),
            self.peer,
            self.config.datagram_size
        );

        // Never read past the announced length, even if the file grows.
        let mut reader = file.take(file_len);
        let started = std::time::Instant::now();
        let mut sender = Sender::new(self.config.datagram_size);
        let mut stats = TransferStats::default();

        if let Err(e) = self
            .run(&mut sender, &mut reader, &name, file_len, &mut stats)
            .await
        {
            log::error!("[client] transfer of {name} failed in {}: {e}", sender.state);
            return Err(e);
        }

        let report = TransferReport::finish(name, file_len, self.peer, stats, started);
        log::info!("[client] sent {report}");
        Ok(report)
    }

    async fn run<R: AsyncRead + Unpin>(
        &self,
        sender: &mut Sender,
        reader: &mut R,
        name: &str,
        file_len: u64,
        stats: &mut TransferStats,
    ) -> Result<()> {
        let announcement = Announcement {
            file_len,
            name: name.to_owned(),
        };
        let bytes = sender.queue_announcement(&announcement)?;
        self.deliver(sender, &bytes, stats).await?;

        let mut chunk = vec![0u8; sender.payload_capacity()];
        let mut queued = 0u64;
        while sender.state != SenderState::Done {
            let n = read_full(reader, &mut chunk).await.map_err(TransferError::Io)?;
            let eof = n == 0;
            if eof && queued < file_len {
                // The file shrank under us; an EOF now would leave the
                // receiver short of the announced length.
                return Err(TransferError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{name} ended after {queued} of {file_len} bytes"),
                )));
            }
            queued += n as u64;
            let bytes = sender.queue_segment(chunk[..n].to_vec(), eof)?;
            self.deliver(sender, &bytes, stats).await?;
        }
        Ok(())
    }

    /// Send the queued datagram and wait until it is acknowledged.
    async fn deliver(&self, sender: &mut Sender, bytes: &[u8], stats: &mut TransferStats) -> Result<()> {
        let seq = sender.next_seq;
        self.send(bytes).await?;
        stats.record_new(bytes.len());
        log::debug!("[client] → seq={seq} len={}", bytes.len());

        let mut timer = RetransmitTimer::start(self.config.attempt_timeout, self.config.max_retries);
        let mut buf = [0u8; 64];
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let received = tokio::select! {
                r = recv_until(&self.transport, &mut buf, timer.deadline()) => {
                    r.map_err(TransferError::Socket)?
                }
                _ = self.cancel.cancelled() => return Err(TransferError::Cancelled),
            };

            match received {
                Some((n, from)) => match decode_ack(&buf[..n]) {
                    Ok(ack) if sender.on_ack(ack) => {
                        log::debug!("[client] ← ACK {ack} from {from}");
                        return Ok(());
                    }
                    Ok(ack) => log::debug!("[client] ← stale ACK {ack}, waiting for {seq}"),
                    Err(e) => {
                        log::warn!("[client] ignoring {n}-byte datagram from {from}: {e}");
                        continue;
                    }
                },
                None => log::debug!("[client] timeout waiting for ACK {seq}"),
            }

            match timer.on_expiry() {
                RetryDecision::Resend(retry) => {
                    self.send(bytes).await?;
                    stats.record_repeat(bytes.len());
                    timer.rearm();
                    log::info!("[client] resending seq={seq} (retry {retry})");
                }
                RetryDecision::GiveUp(attempts) => {
                    return Err(TransferError::MaxRetriesExceeded { seq, attempts });
                }
            }
        }
    }

    async fn send(&self, bytes: &[u8]) -> Result<()> {
        self.transport
            .send_to(bytes, self.peer)
            .await
            .map_err(TransferError::Socket)?;
        Ok(())
    }
}

/// Fill `buf` from `reader`, stopping early only at end of input.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
