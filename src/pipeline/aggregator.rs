//! Running PFCP statistics shared between the ingestion path and the
//! reporting path.
//!
//! The live state is a [`StatsSnapshot`] behind a single mutex. `record`
//! mutates it in place; `take_snapshot` swaps in a fresh one and hands the
//! old state out whole, so a reporting window is closed without copying.

use ahash::AHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use crate::protocol::{DecodedMessage, MessageType};

/// Counters kept for specific message families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedCounter {
    Heartbeat,
    SessionSetup,
    SessionDelete,
    AssociationSetup,
}

const NAMED_COUNTERS: usize = 4;

/// Which named counter each message type feeds. Types not listed feed none.
const CLASSIFICATION: [(MessageType, NamedCounter); 5] = [
    (MessageType::HeartbeatRequest, NamedCounter::Heartbeat),
    (MessageType::HeartbeatResponse, NamedCounter::Heartbeat),
    (MessageType::SessionSetup, NamedCounter::SessionSetup),
    (MessageType::SessionDelete, NamedCounter::SessionDelete),
    (MessageType::AssociationSetup, NamedCounter::AssociationSetup),
];

impl NamedCounter {
    pub const ALL: [NamedCounter; NAMED_COUNTERS] = [
        NamedCounter::Heartbeat,
        NamedCounter::SessionSetup,
        NamedCounter::SessionDelete,
        NamedCounter::AssociationSetup,
    ];

    pub fn classify(message_type: MessageType) -> Option<NamedCounter> {
        CLASSIFICATION
            .iter()
            .find(|(ty, _)| *ty == message_type)
            .map(|(_, counter)| *counter)
    }

    pub fn label(&self) -> &'static str {
        match self {
            NamedCounter::Heartbeat => "Heartbeat",
            NamedCounter::SessionSetup => "Session Setup",
            NamedCounter::SessionDelete => "Session Delete",
            NamedCounter::AssociationSetup => "Association Setup",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// How `reset` treats the window start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStart {
    /// Start a new window now.
    Fresh,
    /// Keep the current window's start time.
    Preserve,
}

/// Statistics for one reporting window.
///
/// A snapshot handed out by [`StatsAggregator`] is fully owned; changing it
/// never touches the live state.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub total_messages: u64,
    pub message_types: AHashMap<MessageType, u64>,
    pub source_ips: AHashMap<String, u64>,
    pub dest_ips: AHashMap<String, u64>,
    pub packet_sizes: AHashMap<usize, u64>,
    named: [u64; NAMED_COUNTERS],
    pub start_time: SystemTime,
    started: Instant,
    pub last_message_time: Option<SystemTime>,
}

impl StatsSnapshot {
    fn new() -> Self {
        Self::starting_at(SystemTime::now(), Instant::now())
    }

    fn starting_at(start_time: SystemTime, started: Instant) -> Self {
        StatsSnapshot {
            total_messages: 0,
            message_types: AHashMap::new(),
            source_ips: AHashMap::new(),
            dest_ips: AHashMap::new(),
            packet_sizes: AHashMap::new(),
            named: [0; NAMED_COUNTERS],
            start_time,
            started,
            last_message_time: None,
        }
    }

    fn fold(&mut self, msg: &DecodedMessage) {
        self.total_messages += 1;
        self.last_message_time = Some(msg.received_at);
        *self.message_types.entry(msg.message_type).or_insert(0) += 1;
        *self
            .source_ips
            .entry(msg.source_ip().to_string())
            .or_insert(0) += 1;
        if let Some(ip) = msg.dest_ip() {
            *self.dest_ips.entry(ip.to_string()).or_insert(0) += 1;
        }
        *self.packet_sizes.entry(msg.len()).or_insert(0) += 1;
        if let Some(counter) = NamedCounter::classify(msg.message_type) {
            self.named[counter.index()] += 1;
        }
    }

    pub fn count(&self, counter: NamedCounter) -> u64 {
        self.named[counter.index()]
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.count(NamedCounter::Heartbeat)
    }

    pub fn session_setup_count(&self) -> u64 {
        self.count(NamedCounter::SessionSetup)
    }

    pub fn session_delete_count(&self) -> u64 {
        self.count(NamedCounter::SessionDelete)
    }

    pub fn association_setup_count(&self) -> u64 {
        self.count(NamedCounter::AssociationSetup)
    }

    /// Time since the window opened, measured on the monotonic clock.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Share of all messages in this window, in percent (0 when empty).
    pub fn percentage(&self, count: u64) -> f64 {
        if self.total_messages == 0 {
            0.0
        } else {
            count as f64 / self.total_messages as f64 * 100.0
        }
    }

    /// Messages per second over `elapsed`.
    pub fn rate(&self, elapsed: Duration) -> f64 {
        self.total_messages as f64 / elapsed.as_secs_f64().max(0.001)
    }

    /// Message-type histogram ordered by type code.
    pub fn sorted_message_types(&self) -> Vec<(MessageType, u64)> {
        let mut entries: Vec<_> = self.message_types.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_unstable_by_key(|(ty, _)| ty.code());
        entries
    }

    /// Packet-size histogram ordered by size.
    pub fn sorted_packet_sizes(&self) -> Vec<(usize, u64)> {
        let mut entries: Vec<_> = self.packet_sizes.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_unstable();
        entries
    }

    /// Address histogram ordered by count (descending), then address.
    pub fn sorted_addresses(map: &AHashMap<String, u64>) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

/// Handle to the live statistics. Clones share the same state.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    inner: Arc<Mutex<StatsSnapshot>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        StatsAggregator {
            inner: Arc::new(Mutex::new(StatsSnapshot::new())),
        }
    }

    // Every mutation is a single fold or a whole-state swap; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold one accepted message into the live window.
    pub fn record(&self, msg: &DecodedMessage) {
        self.lock().fold(msg);
    }

    /// Deep copy of the live window.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().clone()
    }

    /// Replace all counters and histograms with empty ones.
    pub fn reset(&self, start: WindowStart) {
        let mut state = self.lock();
        let fresh = match start {
            WindowStart::Fresh => StatsSnapshot::new(),
            WindowStart::Preserve => StatsSnapshot::starting_at(state.start_time, state.started),
        };
        *state = fresh;
    }

    /// Close the current window: return it and open a fresh one, atomically.
    pub fn take_snapshot(&self) -> StatsSnapshot {
        std::mem::replace(&mut *self.lock(), StatsSnapshot::new())
    }

    pub fn total_messages(&self) -> u64 {
        self.lock().total_messages
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode, SequenceIds};
    use std::net::SocketAddr;
    use std::thread;

    fn msg(ids: &mut SequenceIds, src: &str, ty: u8, len: usize) -> DecodedMessage {
        msg_to(ids, src, None, ty, len)
    }

    fn msg_to(
        ids: &mut SequenceIds,
        src: &str,
        dst: Option<&str>,
        ty: u8,
        len: usize,
    ) -> DecodedMessage {
        let mut pkt = vec![0u8; len];
        pkt[0] = 0x20;
        pkt[1] = ty;
        let source: SocketAddr = format!("{}:8805", src).parse().unwrap();
        let destination = dst.map(|d| format!("{}:8805", d).parse::<SocketAddr>().unwrap());
        decode(&pkt, source, destination, SystemTime::now, ids).unwrap()
    }

    #[test]
    fn record_updates_every_histogram() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        stats.record(&msg(&mut ids, "10.0.0.1", 1, 8));
        stats.record(&msg(&mut ids, "10.0.0.1", 7, 20));
        stats.record(&msg(&mut ids, "10.0.0.2", 7, 20));

        let snap = stats.snapshot();
        assert_eq!(snap.total_messages, 3);
        assert_eq!(snap.message_types[&MessageType::SessionSetup], 2);
        assert_eq!(snap.message_types[&MessageType::HeartbeatRequest], 1);
        assert_eq!(snap.source_ips["10.0.0.1"], 2);
        assert_eq!(snap.source_ips["10.0.0.2"], 1);
        assert_eq!(snap.packet_sizes[&20], 2);
        assert!(snap.dest_ips.is_empty());
        assert!(snap.last_message_time.is_some());
    }

    #[test]
    fn destination_bucket_counts_known_destinations() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        stats.record(&msg_to(&mut ids, "10.0.0.1", Some("10.0.0.9"), 1, 8));
        stats.record(&msg_to(&mut ids, "10.0.0.2", Some("10.0.0.9"), 7, 20));
        stats.record(&msg_to(&mut ids, "10.0.0.1", Some("10.0.0.10"), 1, 8));
        stats.record(&msg(&mut ids, "10.0.0.1", 1, 8));

        let snap = stats.snapshot();
        assert_eq!(snap.total_messages, 4);
        assert_eq!(snap.dest_ips.len(), 2);
        assert_eq!(snap.dest_ips["10.0.0.9"], 2);
        assert_eq!(snap.dest_ips["10.0.0.10"], 1);
        assert_eq!(snap.dest_ips.values().sum::<u64>(), 3, "unknown destinations are not bucketed");
    }

    #[test]
    fn named_counters_follow_classification() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        for ty in [1u8, 2, 4, 7, 9, 3, 5, 6, 8, 10, 99] {
            stats.record(&msg(&mut ids, "10.0.0.1", ty, 8));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.heartbeat_count(), 2);
        assert_eq!(snap.association_setup_count(), 1);
        assert_eq!(snap.session_setup_count(), 1);
        assert_eq!(snap.session_delete_count(), 1);
        let named: u64 = NamedCounter::ALL.iter().map(|c| snap.count(*c)).sum();
        assert_eq!(named, 5, "unclassified types feed no named counter");
    }

    #[test]
    fn histogram_sums_match_total() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        for i in 0..50u8 {
            let src = format!("10.0.0.{}", i % 4);
            let dst = format!("10.0.1.{}", i % 3);
            stats.record(&msg_to(&mut ids, &src, Some(&dst), i % 12, 8 + (i as usize % 5) * 4));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.dest_ips.values().sum::<u64>(), snap.total_messages);
        assert_eq!(snap.message_types.values().sum::<u64>(), snap.total_messages);
        assert_eq!(snap.packet_sizes.values().sum::<u64>(), snap.total_messages);
        assert_eq!(snap.source_ips.values().sum::<u64>(), snap.total_messages);
    }

    #[test]
    fn snapshot_is_independent() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        stats.record(&msg(&mut ids, "10.0.0.1", 1, 8));

        let mut snap = stats.snapshot();
        snap.total_messages = 99;
        snap.source_ips.clear();

        let live = stats.snapshot();
        assert_eq!(live.total_messages, 1);
        assert_eq!(live.source_ips["10.0.0.1"], 1);
    }

    #[test]
    fn reset_clears_all_state() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        stats.record(&msg(&mut ids, "10.0.0.1", 1, 8));
        let before = stats.snapshot();
        assert_eq!(before.total_messages, 1);

        stats.reset(WindowStart::Fresh);
        let after = stats.snapshot();
        assert_eq!(after.total_messages, 0);
        assert!(after.message_types.is_empty());
        assert!(after.source_ips.is_empty());
        assert!(after.dest_ips.is_empty());
        assert!(after.packet_sizes.is_empty());
        assert!(after.last_message_time.is_none());
        assert!(NamedCounter::ALL.iter().all(|c| after.count(*c) == 0));
    }

    #[test]
    fn reset_can_preserve_start_time() {
        let stats = StatsAggregator::new();
        let start = stats.snapshot().start_time;
        thread::sleep(Duration::from_millis(5));
        stats.reset(WindowStart::Preserve);
        assert_eq!(stats.snapshot().start_time, start);
        stats.reset(WindowStart::Fresh);
        assert!(stats.snapshot().start_time > start);
    }

    #[test]
    fn take_snapshot_closes_window() {
        let stats = StatsAggregator::new();
        let mut ids = SequenceIds::new();
        stats.record(&msg(&mut ids, "10.0.0.1", 9, 16));
        let closed = stats.take_snapshot();
        assert_eq!(closed.total_messages, 1);
        assert_eq!(closed.session_delete_count(), 1);
        assert_eq!(stats.total_messages(), 0);
    }

    #[test]
    fn concurrent_record_and_take_lose_nothing() {
        let stats = StatsAggregator::new();
        let writer = {
            let stats = stats.clone();
            thread::spawn(move || {
                let mut ids = SequenceIds::new();
                for _ in 0..2000 {
                    stats.record(&msg(&mut ids, "10.0.0.1", 1, 8));
                }
            })
        };

        let mut seen = 0;
        for _ in 0..100 {
            let snap = stats.take_snapshot();
            assert_eq!(snap.message_types.values().sum::<u64>(), snap.total_messages);
            assert_eq!(snap.heartbeat_count(), snap.total_messages);
            seen += snap.total_messages;
        }
        writer.join().unwrap();
        seen += stats.take_snapshot().total_messages;
        assert_eq!(seen, 2000);
    }

    #[test]
    fn percentage_from_snapshot() {
        let stats = StatsAggregator::new();
        let snap = stats.snapshot();
        assert_eq!(snap.percentage(5), 0.0);

        let mut ids = SequenceIds::new();
        for ty in [1u8, 1, 1, 7] {
            stats.record(&msg(&mut ids, "10.0.0.1", ty, 8));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.percentage(snap.heartbeat_count()), 75.0);
    }
}
