//! Inbound segment acceptance for stop-and-wait delivery.
//!
//! [`Receiver`] implements the strict in-order rule of the receive side:
//!
//! - Only the **next expected** segment is accepted (seq == `last_delivered + 1`).
//! - Duplicates and out-of-order segments are **discarded**; nothing is
//!   buffered.
//! - Every datagram, accepted or not, is answered with an ACK for
//!   `last_delivered`.  After an accept that is the segment just delivered;
//!   after a discard it is the last *confirmed* one.
//!
//! The announced file length bounds how many payload bytes are delivered, so
//! zero padding on the last short segment never reaches the output file.
//!
//! This module only manages state; file and socket I/O is the caller's
//! responsibility (see [`crate::server`]).

use crate::packet::Header;
use crate::state::ReceiverState;

/// What the caller should do with one inbound data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Next expected segment.  Write `payload[..deliver]`, then ACK `ack`.
    Accept { ack: u64, deliver: usize, eof: bool },
    /// Not the next expected segment.  Drop it and ACK `ack`.
    Discard { ack: u64 },
}

impl Delivery {
    /// Sequence number to acknowledge in either case.
    pub fn ack(&self) -> u64 {
        match *self {
            Delivery::Accept { ack, .. } | Delivery::Discard { ack } => ack,
        }
    }
}

/// Receive-side state for one file transfer.
#[derive(Debug)]
pub struct Receiver {
    /// Sequence number of the last accepted segment; `0` after the announcement.
    pub last_delivered: u64,

    /// Current FSM state.
    pub state: ReceiverState,

    /// File length promised by the announcement.
    file_len: u64,

    /// Payload bytes delivered so far.
    written: u64,
}

impl Receiver {
    /// Start a session for a file of `file_len` bytes.
    pub fn new(file_len: u64) -> Self {
        Self {
            last_delivered: 0,
            state: ReceiverState::AwaitData,
            file_len,
            written: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_last_delivered(file_len: u64, last_delivered: u64, written: u64) -> Self {
        Self {
            last_delivered,
            state: ReceiverState::AwaitData,
            file_len,
            written,
        }
    }

    /// Classify an inbound segment and advance state on acceptance.
    ///
    /// `payload_len` is the number of payload bytes on the wire (padding
    /// included).
    pub fn on_segment(&mut self, header: Header, payload_len: usize) -> Delivery {
        if self.state != ReceiverState::AwaitData
            || header.seq != self.last_delivered.wrapping_add(1)
        {
            return Delivery::Discard {
                ack: self.last_delivered,
            };
        }

        self.last_delivered = header.seq;
        let deliver = if header.eof {
            self.state = ReceiverState::Complete;
            0
        } else {
            let owed = self.file_len.saturating_sub(self.written);
            let n = (payload_len as u64).min(owed) as usize;
            self.written += n as u64;
            n
        };

        Delivery::Accept {
            ack: self.last_delivered,
            deliver,
            eof: header.eof,
        }
    }

    /// ACK number for datagrams that could not be classified at all.
    pub fn ack_number(&self) -> u64 {
        self.last_delivered
    }

    /// Payload bytes delivered so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// File length promised by the announcement.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// `true` once every announced byte has been delivered.
    pub fn is_length_satisfied(&self) -> bool {
        self.written == self.file_len
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
