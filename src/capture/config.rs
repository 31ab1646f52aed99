//! Camera capture configuration.
//!
//! Device, pixel format and preset are fixed at startup. Only the
//! frame-rate bounds are commonly tuned, and even those are never
//! renegotiated while a session is live.

use super::PixelFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which side of the device the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    /// Rear wide-angle camera.
    #[default]
    Back,
    Front,
}

/// Capture resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    /// 640x480.
    #[default]
    Vga640x480,
    /// 1280x720.
    Hd1280x720,
}

impl SessionPreset {
    /// Frame dimensions produced by this preset.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            SessionPreset::Vga640x480 => (640, 480),
            SessionPreset::Hd1280x720 => (1280, 720),
        }
    }
}

/// Configuration for camera capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index, used by native backends.
    pub device_index: u32,
    /// Camera position. Recorded on the session and in logs; native
    /// backends pick the device by `device_index` alone.
    pub position: CameraPosition,
    /// Lower frame-rate bound in frames per second.
    pub min_fps: u32,
    /// Upper frame-rate bound in frames per second.
    pub max_fps: u32,
    /// Output pixel format.
    pub pixel_format: PixelFormat,
    /// Output resolution.
    pub preset: SessionPreset,
    /// Drop frames that arrive while the consumer is still busy.
    pub discard_late_frames: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            position: CameraPosition::Back,
            min_fps: 5,
            max_fps: 15,
            pixel_format: PixelFormat::Bgra32,
            preset: SessionPreset::Vga640x480,
            discard_late_frames: true,
        }
    }
}

impl CaptureConfig {
    /// Creates a configuration with the given frame-rate bounds.
    pub fn with_frame_rate(min_fps: u32, max_fps: u32) -> Self {
        Self {
            min_fps,
            max_fps,
            ..Default::default()
        }
    }

    /// Shortest interval between frames (at `max_fps`).
    pub fn min_frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.max_fps.max(1)
    }

    /// Longest interval between frames (at `min_fps`).
    pub fn max_frame_duration(&self) -> Duration {
        Duration::from_secs(1) / self.min_fps.max(1)
    }

    /// Frame dimensions for the configured preset.
    pub fn dimensions(&self) -> (u32, u32) {
        self.preset.dimensions()
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_fps == 0 || self.max_fps == 0 || self.max_fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.min_fps > self.max_fps {
            return Err(ConfigError::InvertedFrameRate {
                min: self.min_fps,
                max: self.max_fps,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("minimum frame rate {min} exceeds maximum {max}")]
    InvertedFrameRate { min: u32, max: u32 },
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration for the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Number of frames to deliver before stopping (0 runs until interrupted).
    pub frame_count: u64,
    /// Switch to the next model after this many delivered frames (0 disables).
    pub cycle_every: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frame_count: 90,
            cycle_every: 30,
            metrics_port: 0,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        Ok(config)
    }
}
