//! RTP Data Packet Parsing
//!
//! Every datagram on the data channel carries a 12-byte RTP header followed by
//! the media payload. Only the fields the client consumes are decoded:
//!
//! ```text
//!  byte 0   | V P X CC          (ignored)
//!  byte 1   | M | payload type  (marker bit, 7-bit type)
//!  byte 2-3 | sequence number   (big-endian u16)
//!  byte 4-7 | timestamp         (big-endian u32)
//!  byte 8-11| SSRC              (ignored)
//!  byte 12..| payload
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::cmp::Ordering;
use thiserror::Error;

/// Size of the fixed RTP header in bytes
pub const HEADER_SIZE: usize = 12;

/// Payload type assigned to motion JPEG (RFC 3551)
pub const MJPEG_PAYLOAD_TYPE: u8 = 26;

/// Marker flag (high bit of byte 1)
const MARKER_FLAG: u8 = 0x80;

/// Mask for the payload type (low 7 bits of byte 1)
const PAYLOAD_TYPE_MASK: u8 = 0x7F;

/// RTP version 2 with no padding, extension or CSRCs
const VERSION_BYTE: u8 = 0x80;

/// Packet parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
}

/// One media frame received on the data channel
///
/// Immutable once parsed. Ordering and equality consider the sequence number
/// only, compared as a raw 16-bit value; wraparound is not taken into account.
#[derive(Debug, Clone)]
pub struct DataFrame {
    payload_type: u8,
    marker: bool,
    sequence: u16,
    timestamp: u32,
    payload: Bytes,
}

impl DataFrame {
    /// Create a new frame
    pub fn new(payload_type: u8, marker: bool, sequence: u16, timestamp: u32, payload: Bytes) -> Self {
        DataFrame {
            payload_type: payload_type & PAYLOAD_TYPE_MASK,
            marker,
            sequence,
            timestamp,
            payload,
        }
    }

    /// Parse one datagram, keeping only frames of `expected_type`
    ///
    /// Returns `Ok(None)` when the payload type does not match; that is a
    /// normal outcome, not an error.
    pub fn parse(datagram: &[u8], expected_type: u8) -> Result<Option<Self>, PacketError> {
        if datagram.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: datagram.len(),
            });
        }

        let mut header = &datagram[..HEADER_SIZE];
        let _flags = header.get_u8();
        let second = header.get_u8();
        let payload_type = second & PAYLOAD_TYPE_MASK;
        if payload_type != expected_type {
            return Ok(None);
        }

        let sequence = header.get_u16();
        let timestamp = header.get_u32();

        Ok(Some(DataFrame {
            payload_type,
            marker: second & MARKER_FLAG != 0,
            sequence,
            timestamp,
            payload: Bytes::copy_from_slice(&datagram[HEADER_SIZE..]),
        }))
    }

    /// Parse a motion JPEG frame
    pub fn parse_mjpeg(datagram: &[u8]) -> Result<Option<Self>, PacketError> {
        Self::parse(datagram, MJPEG_PAYLOAD_TYPE)
    }

    /// Serialize back to the wire layout (SSRC written as zero)
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(VERSION_BYTE);
        let marker = if self.marker { MARKER_FLAG } else { 0 };
        buf.put_u8(marker | self.payload_type);
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(0);
        buf.put_slice(&self.payload);
        buf
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    /// Marker bit, set on the last packet of a video frame
    pub fn marker(&self) -> bool {
        self.marker
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, keeping only its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Total size on the wire (header + payload)
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

impl PartialEq for DataFrame {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for DataFrame {}

impl PartialOrd for DataFrame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataFrame {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence.cmp(&other.sequence)
    }
}
