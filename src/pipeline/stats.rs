//! Runtime counters for the frame pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters updated from the capture and delivery threads.
#[derive(Debug, Default)]
pub struct PipelineStats {
    captured: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
    dropped: AtomicU64,
    transform_nanos: AtomicU64,
    last_sequence: AtomicU64,
}

/// A point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames that reached the pipeline.
    pub frames_captured: u64,
    /// Frames handed to a delivery callback.
    pub frames_delivered: u64,
    /// Frames transformed while no callback was set.
    pub frames_discarded: u64,
    /// Frames the camera dropped before they reached the pipeline.
    pub frames_dropped: u64,
    /// Total time spent inside transforms.
    pub transform_time: Duration,
    /// Sequence number of the most recent captured frame.
    pub last_sequence: u64,
}

impl StatsSnapshot {
    /// Mean transform duration per captured frame.
    pub fn average_transform_time(&self) -> Duration {
        if self.frames_captured == 0 {
            return Duration::ZERO;
        }
        let nanos = self.transform_time.as_nanos() / u128::from(self.frames_captured);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Frames still in flight towards the delivery context.
    pub fn in_flight(&self) -> u64 {
        self.frames_captured
            .saturating_sub(self.frames_delivered + self.frames_discarded)
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_captured(&self, sequence: u64) {
        self.captured.fetch_add(1, Ordering::Relaxed);
        self.last_sequence.store(sequence, Ordering::Relaxed);
    }

    pub(crate) fn record_transform(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.transform_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.captured.load(Ordering::Relaxed),
            frames_delivered: self.delivered.load(Ordering::Relaxed),
            frames_discarded: self.discarded.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            transform_time: Duration::from_nanos(self.transform_nanos.load(Ordering::Relaxed)),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_transform_time() {
        let stats = PipelineStats::new();
        assert_eq!(stats.snapshot().average_transform_time(), Duration::ZERO);

        stats.record_captured(1);
        stats.record_transform(Duration::from_millis(10));
        stats.record_captured(2);
        stats.record_transform(Duration::from_millis(30));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.average_transform_time(), Duration::from_millis(20));
        assert_eq!(snapshot.last_sequence, 2);
    }

    #[test]
    fn test_in_flight() {
        let stats = PipelineStats::new();
        for seq in 1..=3 {
            stats.record_captured(seq);
        }
        stats.record_delivered();
        stats.record_discarded();
        assert_eq!(stats.snapshot().in_flight(), 1);
    }
}
