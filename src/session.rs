//! Per-session bookkeeping shared by the client and server drivers.
//!
//! - [`TransferStats`]: datagram and byte counters, observational only.
//! - [`TransferReport`]: what a finished session hands back to its caller.
//! - [`CancelToken`]: caller-side stop signal, checked between attempts.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Counters accumulated over one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStats {
    /// Datagrams put on (or taken off) the wire, retransmissions included.
    pub datagrams: u64,
    /// Bytes put on (or taken off) the wire, headers and padding included.
    pub bytes: u64,
    /// Distinct protocol units: the announcement, each data segment and EOF.
    pub logical: u64,
    /// Datagrams resent by the sender, or discarded by the receiver.
    pub retransmissions: u64,
}

impl TransferStats {
    /// Count the first transmission (or acceptance) of a new unit.
    pub fn record_new(&mut self, len: usize) {
        self.datagrams += 1;
        self.bytes += len as u64;
        self.logical += 1;
    }

    /// Count a repeated transmission (or discarded arrival).
    pub fn record_repeat(&mut self, len: usize) {
        self.datagrams += 1;
        self.bytes += len as u64;
        self.retransmissions += 1;
    }
}

/// Outcome of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// File name as announced.
    pub file_name: String,
    /// File length in bytes.
    pub file_len: u64,
    /// The other end of the session.
    pub peer: SocketAddr,
    pub stats: TransferStats,
    pub elapsed: Duration,
}

impl TransferReport {
    pub(crate) fn finish(
        file_name: String,
        file_len: u64,
        peer: SocketAddr,
        stats: TransferStats,
        started: Instant,
    ) -> Self {
        Self {
            file_name,
            file_len,
            peer,
            stats,
            elapsed: started.elapsed(),
        }
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes) with {} in {:?}: {} datagrams, {} bytes on the wire, {} repeated",
            self.file_name,
            self.file_len,
            self.peer,
            self.elapsed,
            self.stats.datagrams,
            self.stats.bytes,
            self.stats.retransmissions
        )
    }
}

/// Cloneable stop signal for client and server loops.
///
/// Cancelling is sticky; every clone observes it.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
