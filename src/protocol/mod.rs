//! PFCP header decoding.
//!
//! [`decode`] turns a raw datagram into an owned [`DecodedMessage`]. Anything
//! shorter than the fixed header yields `None`: truncated datagrams are
//! expected noise on a shared capture port and never stop ingestion.

pub mod header;

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::SystemTime;

pub use header::{PfcpHeader, PFCP_MIN_HEADER_LEN};

/// PFCP message types as numbered on the capture port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    HeartbeatRequest,
    HeartbeatResponse,
    PfdManagement,
    AssociationSetup,
    AssociationRelease,
    NodeReport,
    SessionSetup,
    SessionModify,
    SessionDelete,
    SessionReport,
    Unknown(u8),
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            1 => MessageType::HeartbeatRequest,
            2 => MessageType::HeartbeatResponse,
            3 => MessageType::PfdManagement,
            4 => MessageType::AssociationSetup,
            5 => MessageType::AssociationRelease,
            6 => MessageType::NodeReport,
            7 => MessageType::SessionSetup,
            8 => MessageType::SessionModify,
            9 => MessageType::SessionDelete,
            10 => MessageType::SessionReport,
            other => MessageType::Unknown(other),
        }
    }
}

impl MessageType {
    /// Raw on-the-wire value.
    pub fn code(&self) -> u8 {
        match self {
            MessageType::HeartbeatRequest => 1,
            MessageType::HeartbeatResponse => 2,
            MessageType::PfdManagement => 3,
            MessageType::AssociationSetup => 4,
            MessageType::AssociationRelease => 5,
            MessageType::NodeReport => 6,
            MessageType::SessionSetup => 7,
            MessageType::SessionModify => 8,
            MessageType::SessionDelete => 9,
            MessageType::SessionReport => 10,
            MessageType::Unknown(v) => *v,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageType::HeartbeatRequest => "Heartbeat Request",
            MessageType::HeartbeatResponse => "Heartbeat Response",
            MessageType::PfdManagement => "PFD Management",
            MessageType::AssociationSetup => "Association Setup",
            MessageType::AssociationRelease => "Association Release",
            MessageType::NodeReport => "Node Report",
            MessageType::SessionSetup => "Session Setup",
            MessageType::SessionModify => "Session Modify",
            MessageType::SessionDelete => "Session Delete",
            MessageType::SessionReport => "Session Report",
            MessageType::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(v) => write!(f, "Unknown({})", v),
            known => f.write_str(known.name()),
        }
    }
}

/// Errors from header parsing.
#[derive(Debug)]
pub enum ParseError {
    /// Not enough bytes for the fixed header.
    TooShort { expected: usize, actual: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::TooShort { expected, actual } => {
                write!(f, "datagram too short: need {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A decoded PFCP datagram. Owns a copy of the bytes so the receive buffer
/// can be reused immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Analyzer-assigned ordinal, starting at 1. Display ordering only.
    pub id: u64,
    pub version: u8,
    pub message_type: MessageType,
    /// Length field as declared by the sender.
    pub declared_length: u16,
    pub seid: Option<u64>,
    pub sequence: Option<u32>,
    pub payload: Vec<u8>,
    pub received_at: SystemTime,
    pub source: SocketAddr,
    /// Local endpoint the datagram arrived on, when the capture path knows it.
    pub destination: Option<SocketAddr>,
}

impl DecodedMessage {
    #[inline]
    pub fn source_ip(&self) -> IpAddr {
        self.source.ip()
    }

    #[inline]
    pub fn source_port(&self) -> u16 {
        self.source.port()
    }

    #[inline]
    pub fn dest_ip(&self) -> Option<IpAddr> {
        self.destination.map(|d| d.ip())
    }

    /// Actual datagram size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Monotonic message id generator. Owned by a single analyzer, not shared.
#[derive(Debug, Clone)]
pub struct SequenceIds {
    next: u64,
}

impl SequenceIds {
    pub fn new() -> Self {
        SequenceIds { next: 1 }
    }

    /// The id the next successful decode will receive.
    pub fn peek(&self) -> u64 {
        self.next
    }

    fn advance(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for SequenceIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one datagram.
///
/// Returns `None` for datagrams shorter than [`PFCP_MIN_HEADER_LEN`]; in that
/// case neither `now` is called nor an id consumed.
pub fn decode(
    data: &[u8],
    source: SocketAddr,
    destination: Option<SocketAddr>,
    now: impl FnOnce() -> SystemTime,
    ids: &mut SequenceIds,
) -> Option<DecodedMessage> {
    let hdr = match PfcpHeader::parse(data) {
        Ok(hdr) => hdr,
        Err(e) => {
            tracing::trace!(%source, error = %e, "dropping datagram");
            return None;
        }
    };
    tracing::trace!(%source, header = %hdr, "decoded");

    Some(DecodedMessage {
        id: ids.advance(),
        version: hdr.version(),
        message_type: hdr.message_type(),
        declared_length: hdr.length(),
        seid: hdr.seid(),
        sequence: hdr.sequence(),
        payload: hdr.bytes().to_vec(),
        received_at: now(),
        source,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn src() -> SocketAddr {
        "10.0.0.1:8805".parse().unwrap()
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn session_setup_20b() -> Vec<u8> {
        let mut pkt = vec![0u8; 20];
        pkt[0] = 0x21; // version 1, S flag
        pkt[1] = 7;
        pkt[2..4].copy_from_slice(&16u16.to_be_bytes());
        pkt[8..16].copy_from_slice(&0xFFu64.to_be_bytes());
        pkt[16..20].copy_from_slice(&42u32.to_be_bytes());
        pkt
    }

    #[test]
    fn short_datagrams_yield_nothing() {
        let mut ids = SequenceIds::new();
        for len in 0..PFCP_MIN_HEADER_LEN {
            let data = vec![0x20; len];
            assert!(decode(&data, src(), None, || at(0), &mut ids).is_none());
        }
        assert_eq!(ids.peek(), 1, "failed decodes must not consume ids");
    }

    #[test]
    fn clock_not_read_for_dropped_datagram() {
        let mut ids = SequenceIds::new();
        let msg = decode(&[0u8; 3], src(), None, || panic!("clock read"), &mut ids);
        assert!(msg.is_none());
    }

    #[test]
    fn eight_byte_heartbeat() {
        let mut ids = SequenceIds::new();
        let pkt = [0x20, 0x01, 0x00, 0x04, 0, 0, 0, 0];
        let msg = decode(&pkt, src(), None, || at(5), &mut ids).unwrap();
        assert_eq!(msg.id, 1);
        assert_eq!(msg.version, 1);
        assert_eq!(msg.message_type, MessageType::HeartbeatRequest);
        assert_eq!(msg.declared_length, 4);
        assert_eq!(msg.seid, None);
        assert_eq!(msg.sequence, None);
        assert_eq!(msg.received_at, at(5));
        assert_eq!(msg.len(), 8);
    }

    #[test]
    fn full_header_fields() {
        let mut ids = SequenceIds::new();
        let msg = decode(&session_setup_20b(), src(), None, || at(0), &mut ids).unwrap();
        assert_eq!(msg.message_type, MessageType::SessionSetup);
        assert_eq!(msg.seid, Some(0xFF));
        assert_eq!(msg.sequence, Some(42));
        assert_eq!(msg.source_ip(), "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(msg.source_port(), 8805);
        assert_eq!(msg.dest_ip(), None);
    }

    #[test]
    fn decode_is_deterministic_apart_from_id_and_time() {
        let mut ids = SequenceIds::new();
        let pkt = session_setup_20b();
        let a = decode(&pkt, src(), None, || at(1), &mut ids).unwrap();
        let b = decode(&pkt, src(), None, || at(2), &mut ids).unwrap();
        assert_eq!(b.id, a.id + 1);
        assert_eq!(
            (a.version, a.message_type, a.declared_length, a.seid, a.sequence),
            (b.version, b.message_type, b.declared_length, b.seid, b.sequence)
        );
        assert_eq!(a.payload, b.payload);
    }

    #[test]
    fn declared_length_not_validated() {
        let mut ids = SequenceIds::new();
        let pkt = [0x20, 0x02, 0xFF, 0xFF, 0, 0, 0, 0];
        let msg = decode(&pkt, src(), None, || at(0), &mut ids).unwrap();
        assert_eq!(msg.declared_length, 0xFFFF);
        assert_eq!(msg.len(), 8);
    }

    #[test]
    fn payload_is_an_independent_copy() {
        let mut ids = SequenceIds::new();
        let mut buf = session_setup_20b();
        let msg = decode(&buf, src(), None, || at(0), &mut ids).unwrap();
        buf.iter_mut().for_each(|b| *b = 0);
        assert_eq!(msg.payload, session_setup_20b());
    }

    #[test]
    fn unknown_type_keeps_raw_value() {
        let ty = MessageType::from(50);
        assert_eq!(ty, MessageType::Unknown(50));
        assert_eq!(ty.code(), 50);
        assert_eq!(ty.to_string(), "Unknown(50)");
    }

    #[test]
    fn known_codes_round_trip() {
        for code in 1..=10u8 {
            assert_eq!(MessageType::from(code).code(), code);
            assert!(!matches!(MessageType::from(code), MessageType::Unknown(_)));
        }
    }
}
