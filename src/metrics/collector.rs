//! Metrics collection and registry.

use crate::pipeline::{FramePipeline, StatsSnapshot};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    /// Whether capture is running.
    pub running: bool,
    /// Pipeline counters.
    pub stats: StatsSnapshot,
}

impl MetricsSnapshot {
    /// Reads the current state of `pipeline`.
    pub fn from_pipeline(pipeline: &FramePipeline) -> Self {
        Self {
            running: pipeline.is_running(),
            stats: pipeline.stats(),
        }
    }
}

/// Prometheus metrics registry for pipeline monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    running: IntGauge,
    frames_captured: IntCounter,
    frames_delivered: IntCounter,
    frames_discarded: IntCounter,
    frames_dropped: IntCounter,
    transform_seconds_avg: Gauge,
    last_sequence: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let running = IntGauge::new(
            "frame_pipeline_running",
            "Whether the capture session is running (1=running, 0=stopped)",
        )?;
        let frames_captured = IntCounter::new(
            "frame_pipeline_frames_captured_total",
            "Frames that reached the pipeline",
        )?;
        let frames_delivered = IntCounter::new(
            "frame_pipeline_frames_delivered_total",
            "Frames handed to the delivery callback",
        )?;
        let frames_discarded = IntCounter::new(
            "frame_pipeline_frames_discarded_total",
            "Frames transformed while no delivery callback was set",
        )?;
        let frames_dropped = IntCounter::new(
            "frame_pipeline_frames_dropped_total",
            "Frames dropped by the camera because the pipeline was busy",
        )?;
        let transform_seconds_avg = Gauge::new(
            "frame_pipeline_transform_seconds_avg",
            "Mean time spent in the per-frame transform",
        )?;
        let last_sequence = IntGauge::new(
            "frame_pipeline_last_sequence",
            "Sequence number of the most recent captured frame",
        )?;

        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(frames_delivered.clone()))?;
        registry.register(Box::new(frames_discarded.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(transform_seconds_avg.clone()))?;
        registry.register(Box::new(last_sequence.clone()))?;

        Ok(Self {
            registry,
            running,
            frames_captured,
            frames_delivered,
            frames_discarded,
            frames_dropped,
            transform_seconds_avg,
            last_sequence,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        let stats = &snapshot.stats;
        self.running.set(i64::from(snapshot.running));

        // Counters only move forward by the difference
        advance(&self.frames_captured, stats.frames_captured);
        advance(&self.frames_delivered, stats.frames_delivered);
        advance(&self.frames_discarded, stats.frames_discarded);
        advance(&self.frames_dropped, stats.frames_dropped);

        self.transform_seconds_avg
            .set(stats.average_transform_time().as_secs_f64());
        self.last_sequence
            .set(i64::try_from(stats.last_sequence).unwrap_or(i64::MAX));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
