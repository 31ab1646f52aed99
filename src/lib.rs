//! Frame Pipeline Library
//!
//! A live camera pipeline for real-time ML video effects such as neural
//! style transfer. Frames flow from a camera backend through a
//! hot-swappable transform to a hot-swappable delivery callback.
//!
//! # Architecture
//!
//! ```text
//! capture ──frame──▶ pipeline (transform, capture thread) ──post──▶ delivery context
//!                        ▲                    ▲
//!                 set_transform     set_delivery_callback   (any thread)
//! ```
//!
//! # Design Principles
//!
//! - **Drop, don't queue**: late frames are discarded by the camera; there
//!   is no backlog to drain
//! - **Short critical sections**: handlers are copied under a lock and run
//!   outside it
//! - **Transforms never fail upward**: a failing model passes the frame
//!   through unchanged
//! - **Serialized lifecycle**: configure/start/stop/tear down run on one
//!   session queue and are idempotent
//!
//! # Example
//!
//! ```no_run
//! use frame_pipeline::{
//!     capture::{CaptureConfig, Frame, MockCamera},
//!     pipeline::{FramePipeline, PostedDelivery},
//!     transform::{ModelCycle, Sepia},
//! };
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! let delivery = Arc::new(PostedDelivery::new("main"));
//! let pipeline = FramePipeline::new(MockCamera::new(), CaptureConfig::default(), delivery.clone())
//!     .unwrap();
//! pipeline.configure().unwrap();
//!
//! let mut styles = ModelCycle::new(vec![Arc::new(Sepia)]);
//! styles.advance();
//! pipeline.set_transform(Some(styles.current_transform()));
//! pipeline.set_delivery_callback(Some(Arc::new(|frame: Frame| {
//!     println!("frame {} at {:?}", frame.sequence(), frame.timestamp());
//! })));
//!
//! pipeline.start_running().unwrap();
//! delivery.run_until(Instant::now() + Duration::from_secs(1));
//! pipeline.stop_running().unwrap();
//! pipeline.tear_down().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod auth;
pub mod capture;
pub mod metrics;
pub mod pipeline;
pub mod transform;

// Re-export commonly used types at crate root
pub use capture::{CaptureBackend, CaptureConfig, Frame, FrameSink, MockCamera};
pub use pipeline::{
    DeliveryCallback, DeliveryContext, FramePipeline, PipelineError, PostedDelivery, SerialQueue,
    Transform,
};
pub use transform::{FrameModel, ModelCycle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
