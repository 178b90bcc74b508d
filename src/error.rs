//! Error types for transfer sessions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::packet::PacketError;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Why a session ended without a [`crate::session::TransferReport`].
///
/// Every variant is fatal to the current session only; the server loop
/// logs it and waits for the next announcement.
#[derive(Error, Debug)]
pub enum TransferError {
    /// Opening, reading, or writing the local file failed.
    #[error("file I/O failed: {0}")]
    Io(#[source] io::Error),

    /// Binding, sending on, or receiving from the socket failed.
    #[error("socket I/O failed: {0}")]
    Socket(#[source] io::Error),

    /// A datagram could not be built for the configured size.
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The source path has no usable file name to announce.
    #[error("path {0:?} has no UTF-8 file name")]
    InvalidPath(PathBuf),

    /// No matching ACK after `attempts` transmissions of one datagram.
    #[error("segment {seq} not acknowledged after {attempts} attempts")]
    MaxRetriesExceeded { seq: u64, attempts: u32 },

    /// The receiver accepted EOF but wrote a different number of bytes
    /// than the announcement promised.
    #[error("received {received} bytes but {expected} were announced")]
    LengthMismatch { expected: u64, received: u64 },

    /// The session was stopped through its [`crate::session::CancelToken`].
    #[error("transfer cancelled")]
    Cancelled,
}
