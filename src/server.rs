//! Receiving side of a transfer.
//!
//! [`Server`] owns one bound transport and serves transfers one at a time,
//! forever:
//!
//! ```text
//!  AWAIT_NAME ──announcement──▶ AWAIT_DATA ──(ACCEPT | DISCARD)*──▶ COMPLETE ──┐
//!      ▲                                                                       │
//!      └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ACKs go to the source of each datagram, not to a peer fixed at session
//! start.  Malformed datagrams never stop the loop.

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::ServerConfig;
use crate::error::{Result, TransferError};
use crate::packet::{decode_header, encode_ack, Announcement, Header, ANNOUNCE_SEQ, HEADER_LEN};
use crate::receiver::{Delivery, Receiver};
use crate::session::{CancelToken, TransferReport, TransferStats};
use crate::socket::{Socket, Transport, MAX_DATAGRAM};
use crate::state::ReceiverState;

/// Bind `addr` and serve transfers until `cancel` fires.
pub async fn serve(addr: SocketAddr, config: ServerConfig, cancel: CancelToken) -> Result<()> {
    let socket = Socket::bind(addr).await.map_err(TransferError::Socket)?;
    log::info!(
        "[server] listening on {}, writing to {}",
        socket.local_addr,
        config.receive_dir.display()
    );
    Server::new(socket, config).with_cancel(cancel).run().await
}

/// A file receiver bound to one transport.
pub struct Server<T> {
    transport: T,
    config: ServerConfig,
    cancel: CancelToken,
    /// `(peer, eof_seq)` of the last completed session, re-acknowledged on
    /// request in case the final ACK was lost.
    linger: Option<(SocketAddr, u64)>,
    state: ReceiverState,
    buf: Vec<u8>,
}

impl<T: Transport> Server<T> {
    pub fn new(transport: T, config: ServerConfig) -> Self {
        Self {
            transport,
            config,
            cancel: CancelToken::new(),
            linger: None,
            state: ReceiverState::AwaitName,
            buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Phase of the session in progress, `AWAIT_NAME` between sessions.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Serve transfers one after another until cancelled.
    ///
    /// A failed session is logged and the loop moves on; only socket errors
    /// outside a session end it.
    pub async fn run(&mut self) -> Result<()> {
        fs::create_dir_all(&self.config.receive_dir)
            .await
            .map_err(TransferError::Io)?;
        loop {
            match self.receive_one().await {
                Ok(Some(report)) => log::info!("[server] received {report}"),
                Ok(None) | Err(TransferError::Cancelled) => {
                    log::info!("[server] shutting down");
                    return Ok(());
                }
                Err(TransferError::Socket(e)) => return Err(TransferError::Socket(e)),
                Err(e) => log::error!("[server] transfer failed: {e}"),
            }
        }
    }

    /// Serve exactly one transfer.
    ///
    /// Returns `Ok(None)` if cancelled while no transfer was in progress.
    pub async fn receive_one(&mut self) -> Result<Option<TransferReport>> {
        self.state = ReceiverState::AwaitName;
        let Some((announcement, peer, len)) = self.await_name().await? else {
            return Ok(None);
        };
        let started = std::time::Instant::now();
        let mut stats = TransferStats::default();
        stats.record_new(len);

        let path: PathBuf = self.config.receive_dir.join(&announcement.name);
        log::info!(
            "[server] {peer} is sending {} ({} bytes) to {}",
            announcement.name,
            announcement.file_len,
            path.display()
        );
        fs::create_dir_all(&self.config.receive_dir)
            .await
            .map_err(TransferError::Io)?;
        let file = File::create(&path).await.map_err(TransferError::Io)?;
        self.send_ack(ANNOUNCE_SEQ, peer).await?;

        let mut receiver = Receiver::new(announcement.file_len);
        let mut writer = BufWriter::new(file);
        self.state = receiver.state;
        let last_peer = self.await_data(&mut receiver, &mut writer, &mut stats).await?;
        self.state = receiver.state;
        writer.flush().await.map_err(TransferError::Io)?;
        drop(writer);

        self.linger = Some((last_peer, receiver.last_delivered));
        if !receiver.is_length_satisfied() {
            return Err(TransferError::LengthMismatch {
                expected: receiver.file_len(),
                received: receiver.written(),
            });
        }

        Ok(Some(TransferReport::finish(
            announcement.name,
            announcement.file_len,
            last_peer,
            stats,
            started,
        )))
    }

    /// AWAIT_NAME: block until a valid announcement arrives.
    async fn await_name(&mut self) -> Result<Option<(Announcement, SocketAddr, usize)>> {
        loop {
            let Some((n, from)) = self.recv().await? else {
                return Ok(None);
            };
            match Announcement::decode(&self.buf[..n]) {
                Ok(announcement) => return Ok(Some((announcement, from, n))),
                Err(e) => {
                    if let Ok((seq, _)) = decode_header(&self.buf[..n]) {
                        if self.linger == Some((from, seq)) {
                            log::debug!("[server] re-acking final seq={seq} to {from}");
                            self.send_ack(seq, from).await?;
                            continue;
                        }
                    }
                    log::debug!("[server] awaiting a name, dropped {n} bytes from {from}: {e}");
                }
            }
        }
    }

    /// AWAIT_DATA: accept or discard until EOF is accepted.  Returns the
    /// source of the EOF segment.
    async fn await_data(
        &mut self,
        receiver: &mut Receiver,
        writer: &mut BufWriter<File>,
        stats: &mut TransferStats,
    ) -> Result<SocketAddr> {
        loop {
            let Some((n, from)) = self.recv().await? else {
                return Err(TransferError::Cancelled);
            };

            let delivery = match decode_header(&self.buf[..n]) {
                Ok((seq, eof)) => receiver.on_segment(Header { seq, eof }, n - HEADER_LEN),
                Err(e) => {
                    log::warn!("[server] {}: malformed datagram from {from}: {e}", self.state);
                    stats.record_repeat(n);
                    self.send_ack(receiver.ack_number(), from).await?;
                    continue;
                }
            };

            match delivery {
                Delivery::Accept { ack, deliver, eof } => {
                    stats.record_new(n);
                    writer
                        .write_all(&self.buf[HEADER_LEN..HEADER_LEN + deliver])
                        .await
                        .map_err(TransferError::Io)?;
                    log::debug!("[server] ← seq={ack} eof={eof} wrote={deliver}");
                }
                Delivery::Discard { ack } => {
                    stats.record_repeat(n);
                    log::debug!("[server] discarded datagram from {from}; expected seq={}", ack.wrapping_add(1));
                }
            }
            self.send_ack(delivery.ack(), from).await?;

            if receiver.state == ReceiverState::Complete {
                return Ok(from);
            }
        }
    }

    /// Next datagram, or `None` once cancelled.
    async fn recv(&mut self) -> Result<Option<(usize, SocketAddr)>> {
        tokio::select! {
            r = self.transport.recv_from(&mut self.buf) => {
                r.map(Some).map_err(TransferError::Socket)
            }
            _ = self.cancel.cancelled() => Ok(None),
        }
    }

    async fn send_ack(&self, seq: u64, dest: SocketAddr) -> Result<()> {
        self.transport
            .send_to(&encode_ack(seq), dest)
            .await
            .map_err(TransferError::Socket)?;
        Ok(())
    }
}
