//! The frame pipeline controller.

use super::{
    DeliveryCallback, DeliveryContext, HandlerSlots, Handlers, PipelineStats, QueueError,
    SerialQueue, Session, SessionState, SharedSession, StatsSnapshot, Transform,
};
use crate::capture::{CameraError, CaptureBackend, CaptureConfig, Frame, FrameSink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Instant;
use thiserror::Error;

/// Label of the queue serializing session lifecycle calls.
pub const SESSION_QUEUE_LABEL: &str = "queue.session";

/// Label of the default delivery queue.
pub const DELIVERY_QUEUE_LABEL: &str = "queue.delivery";

/// Errors surfaced by pipeline lifecycle operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The camera could not be acquired or wired up. Not retried.
    #[error("capture setup failed: {0}")]
    Setup(#[from] CameraError),
    #[error("capture session is not configured")]
    NotConfigured,
    /// A lifecycle call was made from the capture thread, which the session
    /// queue may have to join.
    #[error("lifecycle call from the capture thread")]
    CaptureThread,
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Per-frame processing shared with the capture backend.
///
/// This is the sink handed to the backend at configure time; it reads the
/// handlers once per frame, runs the transform on the calling (capture)
/// thread and posts delivery to the delivery context.
pub(crate) struct FrameProcessor {
    handlers: HandlerSlots,
    delivery: Arc<dyn DeliveryContext>,
    stats: Arc<PipelineStats>,
    // Thread the backend last delivered on. Ids are never reused, so a
    // stale id from a stopped stream matches nothing.
    capture_thread: Mutex<Option<ThreadId>>,
}

impl FrameProcessor {
    fn new(delivery: Arc<dyn DeliveryContext>) -> Self {
        Self {
            handlers: HandlerSlots::new(),
            delivery,
            stats: Arc::new(PipelineStats::new()),
            capture_thread: Mutex::new(None),
        }
    }

    fn on_capture_thread(&self) -> bool {
        *self.capture_thread.lock() == Some(std::thread::current().id())
    }

    fn note_capture_thread(&self) {
        *self.capture_thread.lock() = Some(std::thread::current().id());
    }

    fn process(&self, frame: Frame) {
        let sequence = frame.sequence();
        self.stats.record_captured(sequence);

        let handlers: Handlers = self.handlers.snapshot();

        let started = Instant::now();
        let output = handlers.apply(frame);
        self.stats.record_transform(started.elapsed());

        match handlers.callback {
            Some(callback) => {
                let stats = Arc::clone(&self.stats);
                self.delivery.post(Box::new(move || {
                    callback(output);
                    stats.record_delivered();
                }));
            }
            None => {
                self.stats.record_discarded();
                tracing::trace!(sequence, "No delivery callback; frame discarded");
            }
        }
    }
}

impl FrameSink for FrameProcessor {
    fn frame_captured(&self, frame: Frame) {
        self.note_capture_thread();
        self.process(frame);
    }

    fn frame_dropped(&self, sequence: u64) {
        self.note_capture_thread();
        self.stats.record_dropped();
        tracing::debug!(sequence, "Dropped frame");
    }
}

/// Owns a capture session and routes its frames through a hot-swappable
/// transform to a hot-swappable delivery callback.
///
/// Lifecycle calls (`configure`, `start_running`, `stop_running`,
/// `tear_down`) are serialized on a dedicated session queue and block until
/// that queue has finished them. Handler setters may be called from any
/// thread at any time.
///
/// Stopping capture joins the capture thread, so lifecycle calls made from
/// it (for example from inside a transform) fail with
/// [`PipelineError::CaptureThread`]. Make them from the delivery callback
/// instead.
///
/// # Example
///
/// ```no_run
/// use frame_pipeline::capture::{CaptureConfig, Frame, MockCamera};
/// use frame_pipeline::pipeline::FramePipeline;
/// use std::sync::Arc;
///
/// let pipeline = FramePipeline::with_delivery_queue(MockCamera::new(), CaptureConfig::default())?;
/// pipeline.configure()?;
/// pipeline.set_delivery_callback(Some(Arc::new(|frame: Frame| println!("{:?}", frame))));
/// pipeline.start_running()?;
/// # Ok::<(), frame_pipeline::pipeline::PipelineError>(())
/// ```
pub struct FramePipeline {
    config: CaptureConfig,
    session: SerialQueue<SessionState>,
    processor: Arc<FrameProcessor>,
    current: SharedSession,
    running: Arc<AtomicBool>,
}

impl FramePipeline {
    /// Creates a pipeline around `backend`, delivering frames on `delivery`.
    ///
    /// Nothing touches the camera until [`configure`](Self::configure).
    pub fn new(
        backend: impl CaptureBackend + 'static,
        config: CaptureConfig,
        delivery: Arc<dyn DeliveryContext>,
    ) -> Result<Self, PipelineError> {
        let current = SharedSession::default();
        let running = Arc::new(AtomicBool::new(false));
        let state =
            SessionState::new(Box::new(backend), Arc::clone(&current), Arc::clone(&running));
        let session = SerialQueue::with_state(SESSION_QUEUE_LABEL, state)?;

        Ok(Self {
            config,
            session,
            processor: Arc::new(FrameProcessor::new(delivery)),
            current,
            running,
        })
    }

    /// Creates a pipeline delivering on its own serial delivery queue.
    pub fn with_delivery_queue(
        backend: impl CaptureBackend + 'static,
        config: CaptureConfig,
    ) -> Result<Self, PipelineError> {
        let delivery = Arc::new(SerialQueue::new(DELIVERY_QUEUE_LABEL)?);
        Self::new(backend, config, delivery)
    }

    /// Acquires the camera and wires its output to this pipeline.
    ///
    /// No-op if already configured. A setup failure is returned as
    /// [`PipelineError::Setup`] and leaves the pipeline unconfigured.
    pub fn configure(&self) -> Result<(), PipelineError> {
        self.check_caller()?;
        let config = self.config.clone();
        let sink: Arc<dyn FrameSink> = Arc::clone(&self.processor) as Arc<dyn FrameSink>;
        let configured = self.session.sync(move |state| state.configure(&config, sink))??;
        if !configured {
            tracing::debug!("configure: session already configured");
        }
        Ok(())
    }

    /// Releases the session and camera. No-op if not configured.
    pub fn tear_down(&self) -> Result<(), PipelineError> {
        self.check_caller()?;
        self.session.sync(|state| state.tear_down())?;
        Ok(())
    }

    /// Starts frame capture. No-op if already running.
    pub fn start_running(&self) -> Result<(), PipelineError> {
        self.check_caller()?;
        self.session.sync(|state| state.start_running())??;
        Ok(())
    }

    /// Stops future frame capture. A transform already executing is not
    /// interrupted. No-op if not running.
    pub fn stop_running(&self) -> Result<(), PipelineError> {
        self.check_caller()?;
        self.session.sync(|state| state.stop_running())?;
        Ok(())
    }

    /// Replaces the per-frame transform. `None` restores pass-through.
    ///
    /// Frames whose processing already began keep the transform they read.
    pub fn set_transform(&self, transform: Option<Transform>) {
        // Dropped outside the lock.
        let _previous = self.processor.handlers.set_transform(transform);
    }

    /// Replaces the delivery callback. `None` discards processed frames.
    pub fn set_delivery_callback(&self, callback: Option<DeliveryCallback>) {
        let _previous = self.processor.handlers.set_callback(callback);
    }

    /// Processes one frame as if the camera had just produced it.
    ///
    /// Backends reach the same path through [`FrameSink`]; this is the entry
    /// point for frames captured outside a [`CaptureBackend`].
    pub fn on_frame_captured(&self, frame: Frame) {
        self.processor.process(frame);
    }

    /// Records a frame dropped upstream.
    pub fn on_frame_dropped(&self, sequence: u64) {
        self.processor.frame_dropped(sequence);
    }

    pub fn is_configured(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns a copy of the active session, if configured.
    pub fn session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// Returns the capture configuration this pipeline applies.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Label of the delivery context.
    pub fn delivery_label(&self) -> &str {
        self.processor.delivery.label()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.processor.stats.snapshot()
    }
}

impl FramePipeline {
    fn check_caller(&self) -> Result<(), PipelineError> {
        if self.processor.on_capture_thread() {
            return Err(PipelineError::CaptureThread);
        }
        Ok(())
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if let Err(e) = self.tear_down() {
            tracing::warn!(error = %e, "Failed to tear down pipeline on drop");
        }
    }
}
