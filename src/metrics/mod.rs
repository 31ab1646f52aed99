//! Prometheus metrics exporter for pipeline monitoring.
//!
//! # Metrics Exposed
//!
//! - `frame_pipeline_running` - Capture state (1=running, 0=stopped)
//! - `frame_pipeline_frames_captured_total` - Frames that reached the pipeline
//! - `frame_pipeline_frames_delivered_total` - Frames handed to the delivery callback
//! - `frame_pipeline_frames_discarded_total` - Frames transformed with no callback set
//! - `frame_pipeline_frames_dropped_total` - Frames dropped by the camera
//! - `frame_pipeline_transform_seconds_avg` - Mean transform duration
//! - `frame_pipeline_last_sequence` - Most recent frame sequence number
//!
//! # Example
//!
//! ```no_run
//! use frame_pipeline::capture::{CaptureConfig, MockCamera};
//! use frame_pipeline::metrics::{MetricsRegistry, MetricsSnapshot};
//! use frame_pipeline::pipeline::FramePipeline;
//!
//! let pipeline = FramePipeline::with_delivery_queue(MockCamera::new(), CaptureConfig::default())
//!     .expect("Failed to create pipeline");
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&MetricsSnapshot::from_pipeline(&pipeline));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
