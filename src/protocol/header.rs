//! Zero-copy PFCP fixed-header view.
//!
//! Only the positional header is decoded. Offsets are fixed and the S flag
//! is not consulted, so a field is present exactly when the datagram is long
//! enough to contain it:
//!
//! ```text
//!   byte  0      version (bits 5-7) | spare | flags
//!   byte  1      message type
//!   bytes 2-3    message length (big-endian, as declared by the sender)
//!   bytes 4-7    not decoded
//!   bytes 8-15   SEID             (datagram >= 16 bytes)
//!   bytes 16-19  sequence number  (datagram >= 20 bytes)
//! ```

use super::{MessageType, ParseError};
use std::fmt;

/// Shortest datagram that carries a decodable header.
pub const PFCP_MIN_HEADER_LEN: usize = 8;

/// A big-endian unsigned field at a fixed byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub width: usize,
}

impl Field {
    pub const fn end(&self) -> usize {
        self.offset + self.width
    }

    /// Read the field from `data`, or `None` if `data` ends before the field does.
    #[inline]
    pub fn read(&self, data: &[u8]) -> Option<u64> {
        let bytes = data.get(self.offset..self.end())?;
        Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

pub const FLAGS: Field = Field { offset: 0, width: 1 };
pub const MESSAGE_TYPE: Field = Field { offset: 1, width: 1 };
pub const LENGTH: Field = Field { offset: 2, width: 2 };
pub const SEID: Field = Field { offset: 8, width: 8 };
pub const SEQUENCE: Field = Field { offset: 16, width: 4 };

/// Zero-copy PFCP header over a received datagram.
#[derive(Debug)]
pub struct PfcpHeader<'a> {
    data: &'a [u8],
}

impl<'a> PfcpHeader<'a> {
    /// Wrap `data`, which must hold at least [`PFCP_MIN_HEADER_LEN`] bytes.
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        if data.len() < PFCP_MIN_HEADER_LEN {
            return Err(ParseError::TooShort {
                expected: PFCP_MIN_HEADER_LEN,
                actual: data.len(),
            });
        }
        Ok(PfcpHeader { data })
    }

    // Mandatory fields lie inside PFCP_MIN_HEADER_LEN, checked in `parse`.
    #[inline]
    fn mandatory(&self, field: Field) -> u64 {
        field.read(self.data).unwrap_or_default()
    }

    /// Protocol version from bits 5-7 of byte 0.
    #[inline]
    pub fn version(&self) -> u8 {
        ((self.mandatory(FLAGS) as u8) >> 5) & 0x07
    }

    #[inline]
    pub fn message_type_raw(&self) -> u8 {
        self.mandatory(MESSAGE_TYPE) as u8
    }

    #[inline]
    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.message_type_raw())
    }

    /// Length as declared by the sender. Never checked against the datagram size.
    #[inline]
    pub fn length(&self) -> u16 {
        self.mandatory(LENGTH) as u16
    }

    #[inline]
    pub fn seid(&self) -> Option<u64> {
        SEID.read(self.data)
    }

    #[inline]
    pub fn sequence(&self) -> Option<u32> {
        SEQUENCE.read(self.data).map(|v| v as u32)
    }

    /// The whole datagram this header was parsed from.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> fmt::Display for PfcpHeader<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} {} len={}",
            self.version(),
            self.message_type(),
            self.length()
        )?;
        if let Some(seid) = self.seid() {
            write!(f, " seid=0x{:016x}", seid)?;
        }
        if let Some(seq) = self.sequence() {
            write!(f, " seq={}", seq)?;
        }
        Ok(())
    }
}
