//! Message display / pretty-printing for the CLI.
//!
//! Formats decoded PFCP messages into one-line summaries or detailed views
//! with hex dumps, and renders statistics reports.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::DisplayConfig;
use crate::pipeline::{MessageSink, NamedCounter, ReportKind, ReportSink, StatsReport, StatsSnapshot};
use crate::protocol::DecodedMessage;

const RULE_WIDTH: usize = 80;

/// Prints every accepted message according to the display options.
#[derive(Debug, Clone, Default)]
pub struct ConsolePresenter {
    config: DisplayConfig,
}

impl ConsolePresenter {
    pub fn new(config: DisplayConfig) -> Self {
        ConsolePresenter { config }
    }
}

impl MessageSink for ConsolePresenter {
    fn on_message(&mut self, msg: &DecodedMessage) {
        if self.config.quiet {
            return;
        }
        if self.config.compact {
            println!("{}", format_summary(msg));
        } else {
            print!("{}", format_detail(msg, &self.config));
        }
    }
}

/// Prints statistics reports to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ReportSink for ConsoleReporter {
    fn on_report(&mut self, report: &StatsReport) {
        print!("{}", format_report(report));
    }
}

/// One-line summary: `[time] #id type src -> dst (n bytes)`.
pub fn format_summary(msg: &DecodedMessage) -> String {
    let dest = match msg.destination {
        Some(addr) => addr.to_string(),
        None => "*".to_string(),
    };
    format!(
        "[{}] #{:<6} {} {} -> {} ({} bytes)",
        format_time_of_day(msg.received_at),
        msg.id,
        msg.message_type,
        msg.source,
        dest,
        msg.len()
    )
}

/// Multi-line view. Header fields, hex text and raw dump are each optional.
pub fn format_detail(msg: &DecodedMessage, config: &DisplayConfig) -> String {
    Detail { msg, config }.to_string()
}

/// Render a statistics report with percentages derived from the snapshot.
pub fn format_report(report: &StatsReport) -> String {
    Report(report).to_string()
}

struct Detail<'a> {
    msg: &'a DecodedMessage,
    config: &'a DisplayConfig,
}

impl fmt::Display for Detail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = self.msg;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{}", rule)?;
        writeln!(f, "Message #{}", msg.id)?;
        writeln!(f, "  Timestamp:   {}", format_datetime(msg.received_at))?;
        writeln!(f, "  Source:      {}", msg.source)?;
        if let Some(dest) = msg.destination {
            writeln!(f, "  Destination: {}", dest)?;
        }
        writeln!(f, "  Protocol:    PFCP")?;
        writeln!(f, "  Length:      {} bytes", msg.len())?;

        if self.config.show_details {
            writeln!(f, "  PFCP Header:")?;
            writeln!(f, "    Version:      {}", msg.version)?;
            writeln!(
                f,
                "    Message Type: {} ({})",
                msg.message_type.code(),
                msg.message_type
            )?;
            writeln!(f, "    Length:       {}", msg.declared_length)?;
            match msg.seid {
                Some(seid) => writeln!(f, "    SEID:         {} (0x{:016x})", seid, seid)?,
                None => writeln!(f, "    SEID:         -")?,
            }
            match msg.sequence {
                Some(seq) => writeln!(f, "    Sequence:     {}", seq)?,
                None => writeln!(f, "    Sequence:     -")?,
            }
        }

        if self.config.show_hex {
            writeln!(f, "  Hex:")?;
            for chunk in msg.payload.chunks(16) {
                f.write_str("    ")?;
                for byte in chunk {
                    write!(f, "{:02x}", byte)?;
                }
                writeln!(f)?;
            }
        }

        if self.config.show_raw {
            writeln!(f, "  Raw ({} bytes):", msg.len())?;
            for line in crate::format_hex_dump(&msg.payload).lines() {
                writeln!(f, "    {}", line)?;
            }
        }

        writeln!(f, "{}", rule)
    }
}

struct Report<'a>(&'a StatsReport);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let snap = &report.snapshot;
        let rule = "=".repeat(RULE_WIDTH);
        let title = match report.kind {
            ReportKind::Periodic => "PFCP Traffic Statistics",
            ReportKind::Final => "PFCP Traffic Statistics (final)",
        };

        writeln!(f, "{}", rule)?;
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "  Start time:     {}", format_datetime(snap.start_time))?;
        writeln!(f, "  Duration:       {}", format_duration(report.elapsed))?;
        writeln!(f, "  Total messages: {}", snap.total_messages)?;
        writeln!(f, "  Average rate:   {:.2} msg/s", snap.rate(report.elapsed))?;
        let last = snap
            .last_message_time
            .map(format_datetime)
            .unwrap_or_else(|| "-".to_string());
        writeln!(f, "  Last message:   {}", last)?;

        if snap.total_messages == 0 {
            writeln!(f)?;
            writeln!(f, "No PFCP messages captured")?;
            return writeln!(f, "{}", rule);
        }

        writeln!(f)?;
        writeln!(f, "Message types:")?;
        for (ty, count) in snap.sorted_message_types() {
            writeln!(
                f,
                "  {} ({}): {} ({:.1}%)",
                ty,
                ty.code(),
                count,
                snap.percentage(count)
            )?;
        }

        write_addresses(f, "Source IPs:", snap, &snap.source_ips)?;
        write_addresses(f, "Destination IPs:", snap, &snap.dest_ips)?;

        writeln!(f)?;
        writeln!(f, "Packet sizes:")?;
        for (size, count) in snap.sorted_packet_sizes() {
            writeln!(f, "  {} bytes: {} ({:.1}%)", size, count, snap.percentage(count))?;
        }

        writeln!(f)?;
        writeln!(f, "Message counters:")?;
        for counter in NamedCounter::ALL {
            writeln!(f, "  {:<18} {}", format!("{}:", counter.label()), snap.count(counter))?;
        }
        writeln!(f, "{}", rule)
    }
}

fn write_addresses(
    f: &mut fmt::Formatter<'_>,
    heading: &str,
    snap: &StatsSnapshot,
    map: &ahash::AHashMap<String, u64>,
) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", heading)?;
    if map.is_empty() {
        return writeln!(f, "  (unknown)");
    }
    for (addr, count) in StatsSnapshot::sorted_addresses(map) {
        writeln!(f, "  {}: {} ({:.1}%)", addr, count, snap.percentage(count))?;
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let millis = d.subsec_millis();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}.{:03}s", h, m, s, millis)
    } else if m > 0 {
        format!("{}m {:02}.{:03}s", m, s, millis)
    } else {
        format!("{}.{:03}s", s, millis)
    }
}

/// `HH:MM:SS.mmm` (UTC).
fn format_time_of_day(t: SystemTime) -> String {
    let since = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        since.subsec_millis()
    )
}

/// `YYYY-MM-DD HH:MM:SS.mmm` (UTC).
fn format_datetime(t: SystemTime) -> String {
    let since = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let (year, month, day) = civil_from_days((since.as_secs() / 86_400) as i64);
    format!("{:04}-{:02}-{:02} {}", year, month, day, format_time_of_day(t))
}

// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
