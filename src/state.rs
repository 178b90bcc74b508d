//! Transfer finite-state machine (FSM) types.
//!
//! Keeping state types in their own module makes it easy to log transitions
//! without touching the send/receive plumbing.  Transitions happen in
//! [`crate::sender`] (send side) and [`crate::server`] (receive side).

use std::fmt;

/// States of the sending side of one transfer.
///
/// A failed session is reported through [`crate::error::TransferError`];
/// the state it failed in is logged.
///
/// ```text
///  ANNOUNCE ──▶ AWAIT_ACK ──ack──▶ SEND_CHUNK ──▶ AWAIT_ACK ──ack──▶ …
///                  │ ▲                                │ ▲
///                  └─┘ timeout / stale ack: resend    └─┘
///
///  … SEND_CHUNK ──eof──▶ AWAIT_FINAL_ACK ──ack──▶ DONE
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Announcement not yet acknowledged.
    #[default]
    Announce,
    /// Ready to read the next chunk from the file.
    SendChunk,
    /// A data segment (or the announcement) is in flight.
    AwaitAck,
    /// The EOF segment is in flight.
    AwaitFinalAck,
    /// EOF acknowledged; terminal.
    Done,
}

/// States of the receiving side.
///
/// ```text
///  AWAIT_NAME ──announcement──▶ AWAIT_DATA ──eof accepted──▶ COMPLETE
///       ▲                        │ ▲                            │
///       │                        └─┘ accept / discard           │
///       └───────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// Waiting for the announcement that starts a transfer.
    #[default]
    AwaitName,
    /// Output file open; waiting for the next segment.
    AwaitData,
    /// EOF accepted and acknowledged.
    Complete,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Announce => "ANNOUNCE",
            Self::SendChunk => "SEND_CHUNK",
            Self::AwaitAck => "AWAIT_ACK",
            Self::AwaitFinalAck => "AWAIT_ACK_FINAL",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitName => "AWAIT_NAME",
            Self::AwaitData => "AWAIT_DATA",
            Self::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}
