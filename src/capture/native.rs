//! Physical camera backend built on nokhwa.
//!
//! nokhwa's `Camera` cannot cross threads, so it is created and owned by the
//! producer thread. `open` attaches the device once and releases it, so a
//! camera that cannot be attached fails at configure time. `start` then
//! waits for the producer thread to report whether the stream reopened.

use super::camera::{CaptureStream, Handoff};
use super::{CameraError, CaptureBackend, CaptureConfig, Frame, FrameSink};
use crossbeam_channel::bounded;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::fmt::Display;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Camera backend reading from a local capture device.
#[derive(Default)]
pub struct NativeCamera {
    config: Option<CaptureConfig>,
    sink: Option<Arc<dyn FrameSink>>,
    stream: Option<CaptureStream>,
}

impl NativeCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureBackend for NativeCamera {
    fn open(&mut self, config: &CaptureConfig, sink: Arc<dyn FrameSink>) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let devices = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CameraError::DeviceNotFound(e.to_string()))?;
        let device = devices.get(config.device_index as usize).ok_or_else(|| {
            CameraError::DeviceNotFound(format!(
                "no device at index {} ({} available)",
                config.device_index,
                devices.len()
            ))
        })?;

        tracing::info!(
            device = %device.human_name(),
            position = ?config.position,
            "Native camera selected"
        );

        let mut camera = open_device(config)?;
        if let Err(e) = camera.stop_stream() {
            tracing::warn!("Failed to release camera after attach check: {}", e);
        }
        drop(camera);

        self.config = Some(config.clone());
        self.sink = Some(sink);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        let config = self.config.clone().ok_or(CameraError::NotInitialized)?;
        let sink = self.sink.clone().ok_or(CameraError::NotInitialized)?;
        if self.stream.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded::<Result<(), CameraError>>(1);
        let stream = CaptureStream::spawn(sink, config.discard_late_frames, move |producer, running| {
            let mut camera = match open_device(&config) {
                Ok(camera) => {
                    let _ = ready_tx.send(Ok(()));
                    camera
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            let started = Instant::now();
            let mut sequence = 0u64;
            while running.load(Ordering::Acquire) {
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        tracing::warn!("Failed to capture frame: {}", e);
                        std::thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                };
                let image = match buffer.decode_image::<RgbAFormat>() {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::warn!("Failed to decode frame: {}", e);
                        continue;
                    }
                };

                sequence += 1;
                let (width, height) = (image.width(), image.height());
                let mut pixels = image.into_raw();
                rgba_to_bgra(&mut pixels);
                let frame = Frame::new(pixels, width, height, started.elapsed(), sequence);

                if producer.offer(frame) == Handoff::Closed {
                    break;
                }
            }

            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Failed to stop camera stream: {}", e);
            }
        })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stream = Some(stream);
                tracing::info!("Native camera streaming");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CameraError::StartFailed("capture thread exited".into())),
        }
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::info!("Native camera stream stopped");
        }
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(CaptureStream::is_running)
    }

    fn close(&mut self) {
        self.stop();
        self.config = None;
        self.sink = None;
        tracing::info!("Native camera closed");
    }
}

fn open_device(config: &CaptureConfig) -> Result<Camera, CameraError> {
    let (width, height) = config.dimensions();
    let format = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, config.max_fps);
    let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(format));

    let camera = attach(
        || Camera::new(CameraIndex::Index(config.device_index), requested),
        Camera::open_stream,
    )?;

    tracing::info!(
        "Camera opened: {} ({}x{})",
        camera.info().human_name(),
        camera.resolution().width(),
        camera.resolution().height()
    );
    Ok(camera)
}

/// Creates the device input, then opens its output stream.
fn attach<C, E1, E2>(
    input: impl FnOnce() -> Result<C, E1>,
    output: impl FnOnce(&mut C) -> Result<(), E2>,
) -> Result<C, CameraError>
where
    E1: Display,
    E2: Display,
{
    let mut device = input().map_err(|e| CameraError::InputUnavailable(e.to_string()))?;
    output(&mut device).map_err(|e| CameraError::OutputUnavailable(e.to_string()))?;
    Ok(device)
}

/// Swaps red and blue in place.
fn rgba_to_bgra(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_to_bgra() {
        let mut pixels = vec![1, 2, 3, 4, 5, 6, 7, 8];
        rgba_to_bgra(&mut pixels);
        assert_eq!(pixels, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_start_without_open() {
        let mut camera = NativeCamera::new();
        assert!(matches!(camera.start(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_attach_maps_input_failure() {
        let result = attach(|| Err::<u32, _>("busy"), |_| Ok::<(), &str>(()));
        assert!(matches!(result, Err(CameraError::InputUnavailable(msg)) if msg == "busy"));
    }

    #[test]
    fn test_attach_maps_output_failure() {
        let mut reached = false;
        let result = attach(
            || Ok::<u32, &str>(7),
            |_| {
                reached = true;
                Err("no stream")
            },
        );
        assert!(reached);
        assert!(matches!(result, Err(CameraError::OutputUnavailable(msg)) if msg == "no stream"));
    }

    #[test]
    fn test_attach_success_returns_device() {
        let result = attach(
            || Ok::<u32, &str>(7),
            |device| {
                *device += 1;
                Ok::<(), &str>(())
            },
        );
        assert_eq!(result.unwrap(), 8);
    }

    #[test]
    fn test_missing_device_fails_configure() {
        use crate::pipeline::{FramePipeline, PipelineError};

        let config = CaptureConfig {
            device_index: u32::MAX,
            ..Default::default()
        };
        let pipeline = FramePipeline::with_delivery_queue(NativeCamera::new(), config).unwrap();
        assert!(matches!(
            pipeline.configure(),
            Err(PipelineError::Setup(CameraError::DeviceNotFound(_)))
        ));
        assert!(!pipeline.is_configured());
    }
}
