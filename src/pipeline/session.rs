//! Capture session state, owned by the session queue.

use super::PipelineError;
use crate::capture::{CameraError, CaptureBackend, CaptureConfig, FrameSink};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The active capture configuration.
///
/// Exists from a successful `configure` until `tear_down`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    config: CaptureConfig,
    configured_at: DateTime<Utc>,
}

impl Session {
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Wall-clock time the session was configured.
    pub fn configured_at(&self) -> DateTime<Utc> {
        self.configured_at
    }
}

/// Session slot readable from any thread.
pub(crate) type SharedSession = Arc<RwLock<Option<Session>>>;

/// Everything the session queue owns: the backend, the session (if any) and
/// the running flag.
///
/// Only the session queue writes `session` and `running`.
pub(crate) struct SessionState {
    backend: Box<dyn CaptureBackend>,
    session: SharedSession,
    running: Arc<AtomicBool>,
}

impl SessionState {
    /// `session` and `running` are shared so other threads, the capture
    /// thread included, can read them without a queue hop.
    pub(crate) fn new(
        backend: Box<dyn CaptureBackend>,
        session: SharedSession,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backend,
            session,
            running,
        }
    }

    #[cfg(test)]
    fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    fn is_configured(&self) -> bool {
        self.session.read().is_some()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Opens the backend once. Returns `false` if a session already existed.
    pub(crate) fn configure(
        &mut self,
        config: &CaptureConfig,
        sink: Arc<dyn FrameSink>,
    ) -> Result<bool, PipelineError> {
        if self.is_configured() {
            return Ok(false);
        }

        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.backend.open(config, sink)?;

        let session = Session {
            config: config.clone(),
            configured_at: Utc::now(),
        };
        tracing::info!(
            position = ?config.position,
            preset = ?config.preset,
            min_fps = config.min_fps,
            max_fps = config.max_fps,
            "Capture session configured"
        );
        *self.session.write() = Some(session);
        Ok(true)
    }

    /// Releases the session and backend resources. Returns `false` if there
    /// was nothing to release.
    pub(crate) fn tear_down(&mut self) -> bool {
        if !self.is_configured() {
            return false;
        }
        if self.is_running() {
            tracing::warn!("Tearing down a running session; stopping capture first");
            self.stop_running();
        }

        self.backend.close();
        *self.session.write() = None;
        tracing::info!("Capture session torn down");
        true
    }

    /// Starts capture. Returns `false` if already running.
    pub(crate) fn start_running(&mut self) -> Result<bool, PipelineError> {
        if !self.is_configured() {
            return Err(PipelineError::NotConfigured);
        }
        if self.is_running() {
            return Ok(false);
        }

        self.backend.start()?;
        self.running.store(true, Ordering::Release);
        tracing::info!("Capture session started");
        Ok(true)
    }

    /// Stops capture. Returns `false` if it was not running.
    pub(crate) fn stop_running(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        self.backend.stop();
        self.running.store(false, Ordering::Release);
        tracing::info!("Capture session stopped");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, MockCamera, MockFailure};

    struct NullSink;

    impl FrameSink for NullSink {
        fn frame_captured(&self, _frame: Frame) {}
        fn frame_dropped(&self, _sequence: u64) {}
    }

    fn state(camera: MockCamera) -> SessionState {
        SessionState::new(
            Box::new(camera),
            SharedSession::default(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_configure_is_idempotent() {
        let camera = MockCamera::new();
        let counters = camera.counters();
        let mut state = state(camera);
        let config = CaptureConfig::default();

        assert!(state.configure(&config, Arc::new(NullSink)).unwrap());
        assert!(!state.configure(&config, Arc::new(NullSink)).unwrap());
        assert_eq!(counters.opens(), 1);
        assert_eq!(state.session().map(|s| s.config().clone()), Some(config));
    }

    #[test]
    fn test_invalid_config_never_reaches_backend() {
        let camera = MockCamera::new();
        let counters = camera.counters();
        let mut state = state(camera);

        let result = state.configure(&CaptureConfig::with_frame_rate(20, 10), Arc::new(NullSink));
        assert!(matches!(
            result,
            Err(PipelineError::Setup(CameraError::ConfigFailed(_)))
        ));
        assert_eq!(counters.opens(), 0);
        assert!(state.session().is_none());
    }

    #[test]
    fn test_backend_failure_leaves_no_session() {
        let mut state = state(MockCamera::new().fail_with(MockFailure::OutputRejected));
        let result = state.configure(&CaptureConfig::default(), Arc::new(NullSink));

        assert!(matches!(
            result,
            Err(PipelineError::Setup(CameraError::OutputUnavailable(_)))
        ));
        assert!(state.session().is_none());
    }

    #[test]
    fn test_start_requires_session() {
        let mut state = state(MockCamera::new());
        assert!(matches!(state.start_running(), Err(PipelineError::NotConfigured)));
        assert!(!state.stop_running());
    }

    #[test]
    fn test_tear_down_stops_running_session() {
        let camera = MockCamera::new().with_frame_limit(0);
        let counters = camera.counters();
        let mut state = state(camera);
        state.configure(&CaptureConfig::default(), Arc::new(NullSink)).unwrap();
        state.start_running().unwrap();

        assert!(state.tear_down());
        assert!(!state.is_running());
        assert_eq!(counters.stops(), 1);
        assert_eq!(counters.closes(), 1);
        assert!(!state.tear_down());
    }
}
