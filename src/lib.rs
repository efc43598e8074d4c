//! pfcpscope library crate: PFCP header decoding, filtering and statistics,
//! re-exported for the binary, benchmarks and tests.

pub mod capture;
pub mod config;
pub mod display;
pub mod filter;
pub mod pipeline;
pub mod protocol;
pub mod report;

/// Registered PFCP UDP port.
pub const PFCP_PORT: u16 = 8805;

/// Default receive buffer length; longer datagrams are truncated.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Format raw bytes as a hex dump: offset, 16 hex bytes, ASCII column.
pub fn format_hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for offset in (0..data.len()).step_by(16) {
        let end = (offset + 16).min(data.len());
        let chunk = &data[offset..end];

        out.push_str(&format!("{:04x}  ", offset));

        for (i, byte) in chunk.iter().enumerate() {
            out.push_str(&format!("{:02x} ", byte));
            if i == 7 {
                out.push(' ');
            }
        }
        for i in chunk.len()..16 {
            out.push_str("   ");
            if i == 7 {
                out.push(' ');
            }
        }

        out.push_str(" |");
        for byte in chunk {
            if byte.is_ascii_graphic() || *byte == b' ' {
                out.push(*byte as char);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }
    out
}
