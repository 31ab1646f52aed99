//! Camera input and frame handling.
//!
//! This module provides the capture configuration, the frame type and the
//! backend abstraction the pipeline drives. Backends deliver frames on their
//! own capture thread and drop frames rather than queue them when the
//! consumer falls behind.

mod camera;
mod config;
mod frame;
#[cfg(feature = "camera")]
mod native;

pub use camera::{
    CameraError, CaptureBackend, FrameSink, MockCamera, MockCounters, MockFailure,
    CAPTURE_THREAD_NAME,
};
pub use config::{CameraPosition, CaptureConfig, ConfigError, FileConfig, OutputConfig, SessionPreset};
pub use frame::{Frame, PixelFormat};
#[cfg(feature = "camera")]
pub use native::NativeCamera;
