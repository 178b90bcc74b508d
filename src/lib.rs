//! `udp-file-transfer`: one file per session over UDP, made reliable with a
//! stop-and-wait ARQ.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐ announcement, segments ┌──────────┐
//!  │  Client  │───────────────────────▶│  Server  │
//!  │ (Sender) │                        │(Receiver)│
//!  └────┬─────┘◀───────────────────────└─────┬────┘
//!       │               ACKs                 │
//!  ┌────▼────────────────────────────────────▼────┐
//!  │      Transport (Socket | Simulator<T>)       │
//!  └──────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     wire format (encode / decode)
//! - [`sender`]     stop-and-wait outbound state
//! - [`receiver`]   in-order accept / discard rule
//! - [`state`]      finite-state-machine types
//! - [`timer`]      per-attempt retransmit timer and retry cap
//! - [`client`]     drives a sender over a transport, file in
//! - [`server`]     drives receivers over a transport, files out
//! - [`session`]    statistics, reports, cancellation
//! - [`config`]     validated transfer parameters
//! - [`error`]      session error taxonomy
//! - [`socket`]     async UDP transport abstraction
//! - [`simulator`]  seeded lossy transport for testing

pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod server;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use client::{send_file, Client};
pub use config::{ServerConfig, TransferConfig};
pub use error::{Result, TransferError};
pub use server::{serve, Server};
pub use session::{CancelToken, TransferReport, TransferStats};
pub use socket::{Socket, Transport};
