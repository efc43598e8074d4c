//! JSON-lines report export. One object per periodic or final report;
//! aggregate statistics only.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::display::ConsoleReporter;
use crate::pipeline::{NamedCounter, ReportKind, ReportSink, StatsReport, StatsSnapshot};

#[derive(Debug, Serialize)]
pub struct MessageTypeCount {
    pub code: u8,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct AddressCount {
    pub address: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct SizeCount {
    pub size: usize,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct NamedCount {
    pub name: &'static str,
    pub count: u64,
}

/// Serialized form of a [`StatsReport`]. Histogram entries are sorted so
/// identical windows serialize identically.
#[derive(Debug, Serialize)]
pub struct ReportRecord {
    pub kind: &'static str,
    pub generated_at: f64,
    pub start_time: f64,
    pub elapsed_secs: f64,
    pub total_messages: u64,
    pub rate: f64,
    pub last_message_time: Option<f64>,
    pub message_types: Vec<MessageTypeCount>,
    pub source_ips: Vec<AddressCount>,
    pub dest_ips: Vec<AddressCount>,
    pub packet_sizes: Vec<SizeCount>,
    pub counters: Vec<NamedCount>,
}

impl ReportRecord {
    pub fn from_report(report: &StatsReport) -> Self {
        let snap = &report.snapshot;
        ReportRecord {
            kind: match report.kind {
                ReportKind::Periodic => "periodic",
                ReportKind::Final => "final",
            },
            generated_at: epoch_secs(report.generated_at),
            start_time: epoch_secs(snap.start_time),
            elapsed_secs: report.elapsed.as_secs_f64(),
            total_messages: snap.total_messages,
            rate: snap.rate(report.elapsed),
            last_message_time: snap.last_message_time.map(epoch_secs),
            message_types: snap
                .sorted_message_types()
                .into_iter()
                .map(|(ty, count)| MessageTypeCount {
                    code: ty.code(),
                    name: ty.to_string(),
                    count,
                })
                .collect(),
            source_ips: addresses(&snap.source_ips),
            dest_ips: addresses(&snap.dest_ips),
            packet_sizes: snap
                .sorted_packet_sizes()
                .into_iter()
                .map(|(size, count)| SizeCount { size, count })
                .collect(),
            counters: NamedCounter::ALL
                .iter()
                .map(|c| NamedCount {
                    name: c.label(),
                    count: snap.count(*c),
                })
                .collect(),
        }
    }
}

fn addresses(map: &ahash::AHashMap<String, u64>) -> Vec<AddressCount> {
    StatsSnapshot::sorted_addresses(map)
        .into_iter()
        .map(|(address, count)| AddressCount { address, count })
        .collect()
}

fn epoch_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Appends each report to a file as one JSON line.
pub struct JsonlReportSink {
    writer: BufWriter<File>,
}

impl JsonlReportSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, std::io::Error> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(JsonlReportSink {
            writer: BufWriter::new(file),
        })
    }

    fn write(&mut self, report: &StatsReport) -> Result<(), std::io::Error> {
        let record = ReportRecord::from_report(report);
        let line = serde_json::to_string(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}

impl ReportSink for JsonlReportSink {
    fn on_report(&mut self, report: &StatsReport) {
        if let Err(err) = self.write(report) {
            tracing::warn!(error = %err, "failed to write report line");
        }
    }
}

/// Console reporting plus, when `report_jsonl` is set, the JSON-lines file.
///
/// A report file that cannot be opened is logged and skipped; console
/// reporting still runs.
pub fn build_sinks(report_jsonl: Option<&Path>) -> Vec<Box<dyn ReportSink>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleReporter)];
    if let Some(path) = report_jsonl {
        match JsonlReportSink::open(path) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "report file disabled");
            }
        }
    }
    sinks
}
