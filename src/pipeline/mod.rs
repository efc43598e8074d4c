//! Capture pipeline.
//!
//! Two activities share the statistics:
//!
//! ```text
//! capture socket (main thread)
//!   |
//!   +--> decode --> filter --> StatsAggregator::record
//!                          \--> MessageSink (presenter)
//!
//! reporter thread (ticker / stop)
//!   |
//!   +--> StatsAggregator::take_snapshot --> ReportSink
//! ```
//!
//! The ingestion path only holds the statistics lock for a single `record`;
//! the reporter only for the snapshot swap.

pub mod aggregator;
pub mod reporter;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use crate::capture::engine::CaptureError;
use crate::filter::FilterConfig;
use crate::protocol::{self, DecodedMessage, SequenceIds};

pub use aggregator::{NamedCounter, StatsAggregator, StatsSnapshot, WindowStart};
pub use reporter::ReporterHandle;

/// One received datagram, borrowing the capture buffer.
#[derive(Debug, Clone, Copy)]
pub struct Datagram<'a> {
    pub payload: &'a [u8],
    pub source: SocketAddr,
    /// Local endpoint the datagram arrived on, if known.
    pub destination: Option<SocketAddr>,
}

/// Supplies datagrams to the ingestion loop.
pub trait DatagramSource {
    /// Receive the next datagram into `buf`.
    ///
    /// `Ok(None)` means nothing arrived before the read timeout.
    /// `Err(CaptureError::Closed)` ends ingestion; other errors are logged
    /// and the loop keeps receiving.
    fn recv<'b>(&mut self, buf: &'b mut [u8]) -> Result<Option<Datagram<'b>>, CaptureError>;
}

/// Receives every accepted message (the presenter).
pub trait MessageSink {
    fn on_message(&mut self, msg: &DecodedMessage);
}

impl<F: FnMut(&DecodedMessage)> MessageSink for F {
    fn on_message(&mut self, msg: &DecodedMessage) {
        self(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Periodic,
    Final,
}

/// A closed statistics window handed to the report sink.
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub kind: ReportKind,
    pub snapshot: StatsSnapshot,
    /// Length of the window the snapshot covers.
    pub elapsed: Duration,
    pub generated_at: SystemTime,
}

/// Receives periodic and final reports. Runs on the reporter thread.
pub trait ReportSink: Send {
    fn on_report(&mut self, report: &StatsReport);
}

impl ReportSink for Vec<Box<dyn ReportSink>> {
    fn on_report(&mut self, report: &StatsReport) {
        for sink in self.iter_mut() {
            sink.on_report(report);
        }
    }
}

/// Ingestion-side counters, including datagrams that never reach the stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounters {
    pub received: u64,
    pub too_short: u64,
    pub rejected: u64,
    pub accepted: u64,
    pub recv_errors: u64,
}

/// Ingestion loop settings.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Receive buffer length; longer datagrams are truncated.
    pub buffer_size: usize,
    /// Stop after this many accepted messages (0 = unlimited).
    pub max_messages: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            buffer_size: crate::DEFAULT_BUFFER_SIZE,
            max_messages: 0,
        }
    }
}

/// Decode, filter and record datagrams. Owns the id generator and filter;
/// shares the statistics with the reporter.
#[derive(Debug)]
pub struct Analyzer {
    ids: SequenceIds,
    filter: FilterConfig,
    stats: StatsAggregator,
    counters: IngestCounters,
}

impl Analyzer {
    pub fn new(filter: FilterConfig) -> Self {
        Self::with_stats(filter, StatsAggregator::new())
    }

    pub fn with_stats(filter: FilterConfig, stats: StatsAggregator) -> Self {
        Analyzer {
            ids: SequenceIds::new(),
            filter,
            stats,
            counters: IngestCounters::default(),
        }
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn counters(&self) -> IngestCounters {
        self.counters
    }

    /// Run one datagram through decode, filter and record. Returns the
    /// message if it was accepted.
    pub fn process(&mut self, datagram: &Datagram<'_>) -> Option<DecodedMessage> {
        self.process_at(datagram, SystemTime::now)
    }

    pub fn process_at(
        &mut self,
        datagram: &Datagram<'_>,
        now: impl FnOnce() -> SystemTime,
    ) -> Option<DecodedMessage> {
        self.counters.received += 1;

        let Some(msg) = protocol::decode(
            datagram.payload,
            datagram.source,
            datagram.destination,
            now,
            &mut self.ids,
        ) else {
            self.counters.too_short += 1;
            return None;
        };

        if !self.filter.accepts(&msg) {
            self.counters.rejected += 1;
            tracing::trace!(id = msg.id, source = %msg.source, "filtered out");
            return None;
        }

        self.stats.record(&msg);
        self.counters.accepted += 1;
        Some(msg)
    }
}

/// Receive until `running` is cleared, the source closes, or the message
/// limit is reached. Accepted messages go to `sink`.
///
/// Clears `running` when the message limit stops the loop so the rest of
/// the process shuts down too.
pub fn run<S, K>(
    analyzer: &mut Analyzer,
    source: &mut S,
    sink: &mut K,
    running: &AtomicBool,
    options: &IngestOptions,
) -> IngestCounters
where
    S: DatagramSource + ?Sized,
    K: MessageSink + ?Sized,
{
    let mut buf = vec![0u8; options.buffer_size.max(protocol::PFCP_MIN_HEADER_LEN)];

    while running.load(Ordering::SeqCst) {
        let datagram = match source.recv(&mut buf) {
            Ok(Some(datagram)) => datagram,
            Ok(None) => continue,
            Err(CaptureError::Closed) => break,
            Err(e) => {
                analyzer.counters.recv_errors += 1;
                tracing::debug!(error = %e, "receive failed");
                continue;
            }
        };

        if let Some(msg) = analyzer.process(&datagram) {
            sink.on_message(&msg);

            if options.max_messages > 0 && analyzer.counters.accepted >= options.max_messages {
                tracing::info!(accepted = analyzer.counters.accepted, "message limit reached");
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    tracing::debug!(counters = ?analyzer.counters, "ingestion stopped");
    analyzer.counters
}
