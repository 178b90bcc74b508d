//! Wire-format definitions for transfer datagrams.
//!
//! Three kinds of datagram cross the wire:
//! - [`DataSegment`]: one file chunk behind the fixed 9-byte control header.
//! - [`Announcement`]: sequence 0; names the file and carries its length.
//! - ACK: a bare big-endian sequence number ([`encode_ack`] / [`decode_ack`]).
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  data segment / announcement header
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Sequence Number (8) |E| Payload ... (zero-padded to datagram_size)
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!
//!  announcement payload:  File Length (8) | UTF-8 name ...
//!
//!  acknowledgement
//! +-+-+-+-+-+-+-+-+
//! | Ack Number (8)|
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! Header size: [`HEADER_LEN`] = 9 bytes, seq(8) + eof(1).

use thiserror::Error;

/// Byte length of the control header that prefixes every data datagram.
pub const HEADER_LEN: usize = 9;

/// Byte length of an ACK datagram.
pub const ACK_LEN: usize = 8;

/// Sequence number reserved for the file-name announcement.
pub const ANNOUNCE_SEQ: u64 = 0;

/// Byte length of the announcement's fixed part: header + file length.
pub const ANNOUNCE_FIXED_LEN: usize = HEADER_LEN + 8;

const OFF_SEQ: usize = 0;
const OFF_EOF: usize = 8;
const OFF_FILE_LEN: usize = HEADER_LEN;

const FLAG_MORE: u8 = 0;
const FLAG_EOF: u8 = 1;

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Fewer than [`HEADER_LEN`] bytes were supplied.
    #[error("datagram of {0} bytes is too short to contain a header")]
    MalformedHeader(usize),
    /// The end-of-file byte was neither 0 nor 1.
    #[error("invalid end-of-file flag byte {0:#04x}")]
    InvalidFlag(u8),
    /// An ACK datagram was not exactly [`ACK_LEN`] bytes.
    #[error("acknowledgement of {0} bytes, expected 8")]
    MalformedAck(usize),
    /// Sequence number was not 0, or the fixed part was truncated.
    #[error("datagram is not a file announcement")]
    MalformedAnnouncement,
    /// The announced name was empty or not valid UTF-8.
    #[error("announced file name is empty or not valid UTF-8")]
    InvalidFileName,
    /// The payload does not fit in the configured datagram size.
    #[error("payload of {payload} bytes exceeds datagram capacity of {capacity}")]
    PayloadTooLarge { payload: usize, capacity: usize },
}

/// Encode the control header for a data datagram.
pub fn encode_header(seq: u64, eof: bool) -> [u8; HEADER_LEN] {
    let mut buf = [0u8; HEADER_LEN];
    buf[OFF_SEQ..OFF_SEQ + 8].copy_from_slice(&seq.to_be_bytes());
    buf[OFF_EOF] = if eof { FLAG_EOF } else { FLAG_MORE };
    buf
}

/// Decode the control header from the first [`HEADER_LEN`] bytes of `buf`.
///
/// Trailing bytes (the payload) are ignored.
pub fn decode_header(buf: &[u8]) -> Result<(u64, bool), PacketError> {
    if buf.len() < HEADER_LEN {
        return Err(PacketError::MalformedHeader(buf.len()));
    }
    let mut seq = [0u8; 8];
    seq.copy_from_slice(&buf[OFF_SEQ..OFF_SEQ + 8]);
    let eof = match buf[OFF_EOF] {
        FLAG_MORE => false,
        FLAG_EOF => true,
        other => return Err(PacketError::InvalidFlag(other)),
    };
    Ok((u64::from_be_bytes(seq), eof))
}

/// Encode an ACK datagram for `seq`.
pub fn encode_ack(seq: u64) -> [u8; ACK_LEN] {
    seq.to_be_bytes()
}

/// Decode an ACK datagram.  Anything but exactly [`ACK_LEN`] bytes is rejected.
pub fn decode_ack(buf: &[u8]) -> Result<u64, PacketError> {
    let bytes: [u8; ACK_LEN] = buf
        .try_into()
        .map_err(|_| PacketError::MalformedAck(buf.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Decoded control header of a data datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Segment sequence number; data starts at 1.
    pub seq: u64,
    /// `true` on the final segment of the file.
    pub eof: bool,
}

/// One data datagram: header + file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub header: Header,
    /// File bytes carried by this segment.  After [`DataSegment::decode`]
    /// this includes any zero padding up to the datagram size.
    pub payload: Vec<u8>,
}

impl DataSegment {
    pub fn new(seq: u64, eof: bool, payload: Vec<u8>) -> Self {
        Self {
            header: Header { seq, eof },
            payload,
        }
    }

    /// Serialise into exactly `datagram_size` bytes, zero-padding the payload.
    pub fn encode(&self, datagram_size: usize) -> Result<Vec<u8>, PacketError> {
        let capacity = datagram_size.saturating_sub(HEADER_LEN);
        if self.payload.len() > capacity {
            return Err(PacketError::PayloadTooLarge {
                payload: self.payload.len(),
                capacity,
            });
        }
        let mut buf = vec![0u8; datagram_size];
        buf[..HEADER_LEN].copy_from_slice(&encode_header(self.header.seq, self.header.eof));
        buf[HEADER_LEN..HEADER_LEN + self.payload.len()].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a data datagram.  The payload is everything after the header.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let (seq, eof) = decode_header(buf)?;
        Ok(Self::new(seq, eof, buf[HEADER_LEN..].to_vec()))
    }
}

/// The first datagram of a session: file name and length, sequence 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Exact byte length of the file; the receiver trims padding with it.
    pub file_len: u64,
    /// Bare file name, used verbatim by the receiver.
    pub name: String,
}

impl Announcement {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ANNOUNCE_FIXED_LEN + self.name.len());
        buf.extend_from_slice(&encode_header(ANNOUNCE_SEQ, false));
        buf.extend_from_slice(&self.file_len.to_be_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let (seq, eof) = decode_header(buf)?;
        if seq != ANNOUNCE_SEQ || eof || buf.len() < ANNOUNCE_FIXED_LEN {
            return Err(PacketError::MalformedAnnouncement);
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&buf[OFF_FILE_LEN..OFF_FILE_LEN + 8]);
        let name = std::str::from_utf8(&buf[ANNOUNCE_FIXED_LEN..])
            .map_err(|_| PacketError::InvalidFileName)?;
        if name.is_empty() {
            return Err(PacketError::InvalidFileName);
        }
        Ok(Self {
            file_len: u64::from_be_bytes(len),
            name: name.to_owned(),
        })
    }
}
