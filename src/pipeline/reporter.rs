//! Reporting path: closes a statistics window on every tick and once more
//! when ingestion stops.

use crossbeam_channel::{select, Receiver, Sender};
use std::io;
use std::thread;
use std::time::{Duration, SystemTime};

use super::{ReportKind, ReportSink, StatsAggregator, StatsReport};

/// Handle to a running reporter thread.
pub struct ReporterHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ReporterHandle {
    /// Stop the reporter and wait for it to emit the final report.
    ///
    /// Call after ingestion has returned so the final report covers every
    /// recorded message.
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("reporter thread panicked");
            }
        }
    }
}

impl Drop for ReporterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the reporter. `interval = None` disables periodic reports; the
/// final report is always emitted.
pub fn spawn<R>(
    stats: StatsAggregator,
    interval: Option<Duration>,
    sink: R,
) -> io::Result<ReporterHandle>
where
    R: ReportSink + 'static,
{
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
    let mut sink = sink;

    let thread = thread::Builder::new()
        .name("pfcp-reporter".into())
        .spawn(move || run(&stats, interval, &stop_rx, &mut sink))?;

    Ok(ReporterHandle {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    })
}

/// Report on every tick until `stop` disconnects (or receives), then emit
/// the final report.
pub fn run<R: ReportSink + ?Sized>(
    stats: &StatsAggregator,
    interval: Option<Duration>,
    stop: &Receiver<()>,
    sink: &mut R,
) {
    let ticker = match interval {
        Some(every) if !every.is_zero() => crossbeam_channel::tick(every),
        _ => crossbeam_channel::never(),
    };

    loop {
        select! {
            recv(ticker) -> _ => emit(stats, ReportKind::Periodic, sink),
            recv(stop) -> _ => break,
        }
    }

    emit(stats, ReportKind::Final, sink);
    tracing::debug!("reporter shut down");
}

fn emit<R: ReportSink + ?Sized>(stats: &StatsAggregator, kind: ReportKind, sink: &mut R) {
    let snapshot = stats.take_snapshot();
    let report = StatsReport {
        kind,
        elapsed: snapshot.elapsed(),
        generated_at: SystemTime::now(),
        snapshot,
    };
    tracing::debug!(
        kind = ?report.kind,
        total = report.snapshot.total_messages,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "report"
    );
    sink.on_report(&report);
}
