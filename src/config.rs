//! Transfer configuration.
//!
//! Values normally come from the command line (see `main.rs`); the library
//! validates them once when a [`crate::client::Client`] or
//! [`crate::server::Server`] is built.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::packet::HEADER_LEN;

/// Default size of every data datagram, header included.
pub const DEFAULT_DATAGRAM_SIZE: usize = 1024;

/// Smallest data datagram: the header plus one payload byte.
pub const MIN_DATAGRAM_SIZE: usize = HEADER_LEN + 1;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// How long the sender waits for an ACK before resending.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(150);

/// Consecutive retransmissions of one datagram before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 50;

/// Where the server writes received files.
pub const DEFAULT_RECEIVE_DIR: &str = "./FilesReceived";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("datagram size {size} outside {}..={}", MIN_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE)]
    DatagramSize { size: usize },
    #[error("attempt timeout must be non-zero")]
    ZeroTimeout,
}

/// Sender-side protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Encoded length of every data datagram.
    pub datagram_size: usize,
    /// Per-attempt ACK wait; reset on every send.
    pub attempt_timeout: Duration,
    /// Retransmissions allowed per datagram after the first send.
    pub max_retries: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            datagram_size: DEFAULT_DATAGRAM_SIZE,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl TransferConfig {
    pub fn with_datagram_size(mut self, datagram_size: usize) -> Self {
        self.datagram_size = datagram_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_DATAGRAM_SIZE..=MAX_DATAGRAM_SIZE).contains(&self.datagram_size) {
            return Err(ConfigError::DatagramSize {
                size: self.datagram_size,
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// File bytes carried per data datagram.
    pub fn payload_capacity(&self) -> usize {
        self.datagram_size.saturating_sub(HEADER_LEN)
    }
}

/// Receiver-side parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory received files are written to, created on demand.
    pub receive_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            receive_dir: PathBuf::from(DEFAULT_RECEIVE_DIR),
        }
    }
}
