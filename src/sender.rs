//! Outbound segment state for stop-and-wait reliability.
//!
//! [`Sender`] tracks sequence numbers and the single in-flight datagram.
//! It does **not** touch the socket or the file; [`crate::client`] calls
//! these methods and owns the actual send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** datagram is in flight at any moment (`unacked`).
//! - A new datagram may only be queued once `unacked` is `None`.
//! - On the matching ACK: advance `next_seq`; clear `unacked`.
//! - On timeout or a mismatched ACK the caller resends the same bytes.

use crate::config::MAX_DATAGRAM_SIZE;
use crate::packet::{Announcement, DataSegment, PacketError, ANNOUNCE_SEQ, HEADER_LEN};
use crate::state::SenderState;

/// The datagram that has been sent but not yet acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    /// Sequence number the receiver must echo back.
    pub seq: u64,
    /// `true` for the final, EOF-flagged segment.
    pub eof: bool,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Stop-and-wait send-side state for one file transfer.
#[derive(Debug)]
pub struct Sender {
    /// Sequence number of the **next** segment to queue.
    ///
    /// `0` until the announcement is queued, then `1, 2, …` per chunk.
    pub next_seq: u64,

    /// The in-flight datagram, or `None` when the sender is idle.
    pub unacked: Option<InFlight>,

    /// Current FSM state.
    pub state: SenderState,

    datagram_size: usize,
}

impl Sender {
    /// Create a new [`Sender`] producing data datagrams of `datagram_size` bytes.
    pub fn new(datagram_size: usize) -> Self {
        Self {
            next_seq: ANNOUNCE_SEQ,
            unacked: None,
            state: SenderState::Announce,
            datagram_size,
        }
    }

    /// File bytes that fit into one data datagram.
    pub fn payload_capacity(&self) -> usize {
        self.datagram_size - HEADER_LEN
    }

    /// Queue the announcement (sequence 0) and return the bytes to send.
    ///
    /// The announcement is not padded and may be longer than a data
    /// datagram; only the UDP payload limit applies to it.
    pub fn queue_announcement(&mut self, announcement: &Announcement) -> Result<Vec<u8>, PacketError> {
        debug_assert_eq!(self.next_seq, ANNOUNCE_SEQ, "announcement queued twice");
        let bytes = announcement.encode();
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(PacketError::PayloadTooLarge {
                payload: bytes.len() - HEADER_LEN,
                capacity: MAX_DATAGRAM_SIZE - HEADER_LEN,
            });
        }
        self.record_sent(ANNOUNCE_SEQ, false);
        self.state = SenderState::AwaitAck;
        Ok(bytes)
    }

    /// Queue the next data segment and return the bytes to send.
    ///
    /// `eof` marks the final segment; it still consumes a sequence number.
    pub fn queue_segment(&mut self, payload: Vec<u8>, eof: bool) -> Result<Vec<u8>, PacketError> {
        let segment = DataSegment::new(self.next_seq, eof, payload);
        let bytes = segment.encode(self.datagram_size)?;
        self.record_sent(self.next_seq, eof);
        self.state = if eof {
            SenderState::AwaitFinalAck
        } else {
            SenderState::AwaitAck
        };
        Ok(bytes)
    }

    fn record_sent(&mut self, seq: u64, eof: bool) {
        debug_assert!(
            self.unacked.is_none(),
            "record_sent called while a datagram is already in flight"
        );
        self.unacked = Some(InFlight { seq, eof });
    }

    /// Process an inbound ACK number.
    ///
    /// Returns `true` if it acknowledges the in-flight datagram.  Any other
    /// number leaves the datagram in flight; the caller resends it.
    pub fn on_ack(&mut self, ack: u64) -> bool {
        match self.unacked {
            Some(entry) if entry.seq == ack => {
                self.state = if entry.eof {
                    SenderState::Done
                } else {
                    SenderState::SendChunk
                };
                self.next_seq = ack.wrapping_add(1);
                self.unacked = None;
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
