//! Replaceable per-frame transform and delivery callback.

use crate::capture::Frame;
use parking_lot::Mutex;
use std::sync::Arc;

/// Synchronous per-frame transform. A transform that cannot produce a result
/// returns its input unchanged.
pub type Transform = Arc<dyn Fn(Frame) -> Frame + Send + Sync>;

/// Consumer of processed frames, run on the delivery context.
pub type DeliveryCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// A consistent pair of handlers as read for one frame.
#[derive(Clone, Default)]
pub struct Handlers {
    pub transform: Option<Transform>,
    pub callback: Option<DeliveryCallback>,
}

impl Handlers {
    /// Applies the transform, or passes the frame through when none is set.
    pub fn apply(&self, frame: Frame) -> Frame {
        match &self.transform {
            Some(transform) => transform(frame),
            None => frame,
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("transform", &self.transform.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Both handler slots behind one lock.
///
/// The lock is held only to clone or swap the `Arc`s; handlers never run
/// while it is held, and replaced handlers are dropped after it is released.
#[derive(Default)]
pub struct HandlerSlots {
    inner: Mutex<Handlers>,
}

impl HandlerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out both handlers in a single critical section.
    pub fn snapshot(&self) -> Handlers {
        self.inner.lock().clone()
    }

    /// Replaces the transform, returning the previous one.
    pub fn set_transform(&self, transform: Option<Transform>) -> Option<Transform> {
        std::mem::replace(&mut self.inner.lock().transform, transform)
    }

    /// Replaces the delivery callback, returning the previous one.
    pub fn set_callback(&self, callback: Option<DeliveryCallback>) -> Option<DeliveryCallback> {
        std::mem::replace(&mut self.inner.lock().callback, callback)
    }

    pub fn transform(&self) -> Option<Transform> {
        self.inner.lock().transform.clone()
    }

    pub fn callback(&self) -> Option<DeliveryCallback> {
        self.inner.lock().callback.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(value: u8) -> Transform {
        Arc::new(move |frame: Frame| {
            let mut frame = frame;
            frame.pixels_mut()[0] = value;
            frame
        })
    }

    #[test]
    fn test_empty_slots_pass_frames_through() {
        let slots = HandlerSlots::new();
        let frame = Frame::solid(2, 2, [10, 20, 30, 255], 1);

        let handlers = slots.snapshot();
        assert!(handlers.callback.is_none());
        assert_eq!(handlers.apply(frame.clone()), frame);
    }

    #[test]
    fn test_set_returns_previous() {
        let slots = HandlerSlots::new();
        assert!(slots.set_transform(Some(tag(1))).is_none());

        let previous = slots.set_transform(Some(tag(2))).unwrap();
        let frame = Frame::solid(1, 1, [0, 0, 0, 0], 1);
        assert_eq!(previous(frame.clone()).pixels()[0], 1);
        assert_eq!(slots.snapshot().apply(frame).pixels()[0], 2);

        assert!(slots.set_transform(None).is_some());
        assert!(slots.transform().is_none());
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_swaps() {
        let slots = HandlerSlots::new();
        slots.set_transform(Some(tag(7)));
        let snapshot = slots.snapshot();

        slots.set_transform(Some(tag(8)));
        let frame = Frame::solid(1, 1, [0, 0, 0, 0], 1);
        assert_eq!(snapshot.apply(frame).pixels()[0], 7);
    }
}
