//! Camera abstraction for frame capture.
//!
//! A backend owns the physical (or synthetic) device and pushes frames into
//! a [`FrameSink`] from its own capture thread. Backends are driven by the
//! pipeline's session context and never call back into it synchronously.

use super::{CaptureConfig, Frame};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Name of the thread on which backends invoke the sink.
pub const CAPTURE_THREAD_NAME: &str = "queue.video.output";

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("cannot attach camera input: {0}")]
    InputUnavailable(String),
    #[error("cannot attach capture output: {0}")]
    OutputUnavailable(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to start capture: {0}")]
    StartFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// Receiver of captured frames.
///
/// Both methods are called on the backend's capture thread, in capture order.
pub trait FrameSink: Send + Sync {
    /// A frame was captured and is handed over by value.
    fn frame_captured(&self, frame: Frame);

    /// A frame was discarded before reaching the sink because the sink was
    /// still busy with an earlier one.
    fn frame_dropped(&self, sequence: u64);
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing.
pub trait CaptureBackend: Send {
    /// Acquires the device, applies `config` and attaches the output to `sink`.
    fn open(&mut self, config: &CaptureConfig, sink: Arc<dyn FrameSink>) -> Result<(), CameraError>;

    /// Starts delivering frames to the sink.
    fn start(&mut self) -> Result<(), CameraError>;

    /// Stops delivering frames. Frames already handed to the sink are not
    /// interrupted.
    fn stop(&mut self);

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Checks if frames are currently being delivered.
    fn is_streaming(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

impl<B: CaptureBackend + ?Sized> CaptureBackend for Box<B> {
    fn open(&mut self, config: &CaptureConfig, sink: Arc<dyn FrameSink>) -> Result<(), CameraError> {
        (**self).open(config, sink)
    }

    fn start(&mut self) -> Result<(), CameraError> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn is_streaming(&self) -> bool {
        (**self).is_streaming()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Running capture threads shared by the mock and native backends.
pub(crate) struct CaptureStream {
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

/// Producer side of a capture stream: a one-slot hand-off to the capture
/// thread plus a side channel for drop notifications.
pub(crate) struct FrameProducer {
    frames: Sender<Frame>,
    drops: Sender<u64>,
    discard_late_frames: bool,
}

/// Outcome of handing a frame to the capture thread.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Handoff {
    Queued,
    Dropped,
    Closed,
}

impl FrameProducer {
    /// Offers a frame to the capture thread, dropping it if the slot is
    /// occupied and late frames are discarded.
    pub(crate) fn offer(&self, frame: Frame) -> Handoff {
        if !self.discard_late_frames {
            return match self.frames.send(frame) {
                Ok(()) => Handoff::Queued,
                Err(_) => Handoff::Closed,
            };
        }

        let sequence = frame.sequence();
        match self.frames.try_send(frame) {
            Ok(()) => Handoff::Queued,
            Err(TrySendError::Full(_)) => match self.drops.send(sequence) {
                Ok(()) => Handoff::Dropped,
                Err(_) => Handoff::Closed,
            },
            Err(TrySendError::Disconnected(_)) => Handoff::Closed,
        }
    }
}

impl CaptureStream {
    /// Spawns the capture thread and a producer thread running `produce`.
    ///
    /// `produce` is called with the producer handle and the running flag and
    /// should return once the flag is cleared or its source is exhausted.
    pub(crate) fn spawn<P>(
        sink: Arc<dyn FrameSink>,
        discard_late_frames: bool,
        produce: P,
    ) -> Result<Self, CameraError>
    where
        P: FnOnce(FrameProducer, Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = bounded(1);
        let (drop_tx, drop_rx) = unbounded();

        let consumer = std::thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || deliver_to_sink(sink, frame_rx, drop_rx))
            .map_err(|e| CameraError::StartFailed(e.to_string()))?;

        let producer = FrameProducer {
            frames: frame_tx,
            drops: drop_tx,
            discard_late_frames,
        };
        let running_clone = Arc::clone(&running);
        let producer = std::thread::Builder::new()
            .name("camera.producer".to_string())
            .spawn(move || {
                produce(producer, Arc::clone(&running_clone));
                // Source exhausted or stopped; either way nothing streams now.
                running_clone.store(false, Ordering::Release);
            })
            .map_err(|e| CameraError::StartFailed(e.to_string()))?;

        Ok(Self {
            running,
            producer: Some(producer),
            consumer: Some(consumer),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signals the producer and waits for both threads to finish.
    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture thread body: forwards frames and drop notices until the producer
/// hangs up.
fn deliver_to_sink(sink: Arc<dyn FrameSink>, frames: Receiver<Frame>, drops: Receiver<u64>) {
    loop {
        select! {
            recv(frames) -> msg => match msg {
                Ok(frame) => sink.frame_captured(frame),
                Err(_) => break,
            },
            recv(drops) -> msg => {
                if let Ok(sequence) = msg {
                    sink.frame_dropped(sequence);
                }
            }
        }
    }
    tracing::debug!("Capture thread stopped");
}

/// Setup failures a [`MockCamera`] can be told to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NoDevice,
    InputRejected,
    OutputRejected,
}

/// Call counters for a [`MockCamera`], shared so tests can observe a camera
/// that has been moved into a pipeline.
#[derive(Debug, Default)]
pub struct MockCounters {
    opens: AtomicU64,
    starts: AtomicU64,
    stops: AtomicU64,
    closes: AtomicU64,
    frames_produced: AtomicU64,
    frames_dropped: AtomicU64,
}

impl MockCounters {
    /// Calls to `open`, including failed ones.
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Calls to `start`.
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Calls to `stop`.
    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Calls to `close`.
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames_produced.load(Ordering::SeqCst)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::SeqCst)
    }
}

/// Mock camera for testing that generates synthetic BGRA frames.
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sink: Option<Arc<dyn FrameSink>>,
    stream: Option<CaptureStream>,
    frame_interval: Option<Duration>,
    frame_limit: Option<u64>,
    failure: Option<MockFailure>,
    sequence: Arc<AtomicU64>,
    counters: Arc<MockCounters>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self {
            config: None,
            sink: None,
            stream: None,
            frame_interval: None,
            frame_limit: None,
            failure: None,
            sequence: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Overrides the interval derived from `max_fps`.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Stops producing after `limit` frames per start.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Makes `open` fail as if the device or its input/output were missing.
    pub fn fail_with(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Returns the shared call counters.
    pub fn counters(&self) -> Arc<MockCounters> {
        Arc::clone(&self.counters)
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for MockCamera {
    fn open(&mut self, config: &CaptureConfig, sink: Arc<dyn FrameSink>) -> Result<(), CameraError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(MockFailure::NoDevice) => {
                return Err(CameraError::DeviceNotFound(format!("{:?} camera", config.position)))
            }
            Some(MockFailure::InputRejected) => {
                return Err(CameraError::InputUnavailable("mock input rejected".into()))
            }
            Some(MockFailure::OutputRejected) => {
                return Err(CameraError::OutputUnavailable("mock output rejected".into()))
            }
            None => {}
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        self.config = Some(config.clone());
        self.sink = Some(sink);
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;
        let sink = self.sink.clone().ok_or(CameraError::NotInitialized)?;
        if self.stream.is_some() {
            return Ok(());
        }

        let (width, height) = config.dimensions();
        let interval = self.frame_interval.unwrap_or_else(|| config.min_frame_duration());
        let limit = self.frame_limit;
        let sequence = Arc::clone(&self.sequence);
        let counters = Arc::clone(&self.counters);

        let stream = CaptureStream::spawn(sink, config.discard_late_frames, move |producer, running| {
            let started = Instant::now();
            let mut produced = 0u64;
            while running.load(Ordering::Acquire) && limit.map_or(true, |l| produced < l) {
                let seq = sequence.fetch_add(1, Ordering::SeqCst) + 1;
                let frame = synthetic_frame(width, height, started.elapsed(), seq);
                produced += 1;
                counters.frames_produced.fetch_add(1, Ordering::SeqCst);

                match producer.offer(frame) {
                    Handoff::Queued => {}
                    Handoff::Dropped => {
                        counters.frames_dropped.fetch_add(1, Ordering::SeqCst);
                    }
                    Handoff::Closed => break,
                }
                if !interval.is_zero() {
                    std::thread::sleep(interval);
                }
            }
        })?;

        self.stream = Some(stream);
        tracing::info!(width, height, ?interval, "MockCamera streaming");
        Ok(())
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::info!("MockCamera stream stopped");
        }
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(CaptureStream::is_running)
    }

    fn close(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.config = None;
        self.sink = None;
        tracing::info!("MockCamera closed");
    }
}

/// Moving gradient so consecutive frames differ.
fn synthetic_frame(width: u32, height: u32, timestamp: Duration, sequence: u64) -> Frame {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let shift = sequence as u32;
            pixels.push((x.wrapping_add(shift) & 0xFF) as u8);
            pixels.push((y & 0xFF) as u8);
            pixels.push(((x ^ y).wrapping_add(shift) & 0xFF) as u8);
            pixels.push(0xFF);
        }
    }
    Frame::new(pixels, width, height, timestamp, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect {
        frames: Mutex<Vec<u64>>,
        dropped: Mutex<Vec<u64>>,
    }

    impl FrameSink for Collect {
        fn frame_captured(&self, frame: Frame) {
            assert!(frame.is_valid());
            self.frames.lock().push(frame.sequence());
        }

        fn frame_dropped(&self, sequence: u64) {
            self.dropped.lock().push(sequence);
        }
    }

    #[test]
    fn test_mock_camera_lifecycle() {
        let sink = Arc::new(Collect::default());
        let mut camera = MockCamera::new()
            .with_frame_interval(Duration::ZERO)
            .with_frame_limit(5);
        let config = CaptureConfig {
            discard_late_frames: false,
            ..Default::default()
        };

        assert!(!camera.is_open());
        camera.open(&config, sink.clone()).unwrap();
        assert!(camera.is_open());

        camera.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.frames.lock().len() < 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        camera.stop();

        assert_eq!(*sink.frames.lock(), vec![1, 2, 3, 4, 5]);
        assert!(sink.dropped.lock().is_empty());

        camera.close();
        assert!(!camera.is_open());
    }

    #[test]
    fn test_streaming_ends_with_frame_limit() {
        let sink = Arc::new(Collect::default());
        let mut camera = MockCamera::new()
            .with_frame_interval(Duration::ZERO)
            .with_frame_limit(3);
        let config = CaptureConfig {
            discard_late_frames: false,
            ..Default::default()
        };
        camera.open(&config, sink.clone()).unwrap();
        camera.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while camera.is_streaming() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!camera.is_streaming());
        assert!(camera.is_open());

        camera.stop();
        assert_eq!(*sink.frames.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_start_without_open() {
        let mut camera = MockCamera::new();
        assert!(matches!(camera.start(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_simulated_missing_device() {
        let mut camera = MockCamera::new().fail_with(MockFailure::NoDevice);
        let result = camera.open(&CaptureConfig::default(), Arc::new(Collect::default()));
        assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
        assert!(!camera.is_open());
    }

    #[test]
    fn test_slow_sink_drops_frames() {
        struct Slow(Collect);
        impl FrameSink for Slow {
            fn frame_captured(&self, frame: Frame) {
                std::thread::sleep(Duration::from_millis(50));
                self.0.frame_captured(frame);
            }
            fn frame_dropped(&self, sequence: u64) {
                self.0.frame_dropped(sequence);
            }
        }

        let sink = Arc::new(Slow(Collect::default()));
        let mut camera = MockCamera::new()
            .with_frame_interval(Duration::ZERO)
            .with_frame_limit(200);
        let counters = camera.counters();
        camera.open(&CaptureConfig::default(), sink.clone()).unwrap();
        camera.start().unwrap();
        std::thread::sleep(Duration::from_millis(300));
        camera.stop();

        let delivered = sink.0.frames.lock().len() as u64;
        let dropped = counters.frames_dropped();
        assert!(dropped > 0);
        assert_eq!(delivered + dropped, counters.frames_produced());

        // Delivered frames keep capture order.
        let frames = sink.0.frames.lock();
        assert!(frames.windows(2).all(|w| w[0] < w[1]));
    }
}
