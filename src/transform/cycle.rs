//! Cycling through a fixed list of models, one step per user action.

use super::{identity, model_transform, FrameModel};
use crate::pipeline::Transform;
use std::sync::Arc;

/// An ordered set of models with at most one active.
///
/// Advancing walks `none → first → … → last → none`, so the unmodified
/// camera feed is always one step in the rotation.
#[derive(Default)]
pub struct ModelCycle {
    models: Vec<Arc<dyn FrameModel>>,
    active: Option<usize>,
}

impl ModelCycle {
    /// Creates a cycle with no model active.
    pub fn new(models: Vec<Arc<dyn FrameModel>>) -> Self {
        Self { models, active: None }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The active model, if any.
    pub fn active(&self) -> Option<&Arc<dyn FrameModel>> {
        self.active.and_then(|i| self.models.get(i))
    }

    /// Name of the active model, if any.
    pub fn active_name(&self) -> Option<&str> {
        self.active().map(|m| m.name())
    }

    /// Moves to the next model and returns its name.
    pub fn advance(&mut self) -> Option<&str> {
        self.active = match self.active {
            None if !self.models.is_empty() => Some(0),
            Some(i) if i + 1 < self.models.len() => Some(i + 1),
            _ => None,
        };
        tracing::info!(model = self.active_name().unwrap_or("none"), "Active model changed");
        self.active_name()
    }

    /// Transform for the active model, identity when none is active.
    pub fn current_transform(&self) -> Transform {
        match self.active() {
            Some(model) => model_transform(Arc::clone(model)),
            None => identity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;
    use crate::transform::{Grayscale, Invert};

    fn cycle() -> ModelCycle {
        ModelCycle::new(vec![Arc::new(Invert), Arc::new(Grayscale)])
    }

    #[test]
    fn test_starts_inactive() {
        let cycle = cycle();
        assert_eq!(cycle.len(), 2);
        assert!(cycle.active().is_none());

        let frame = Frame::solid(1, 1, [1, 2, 3, 255], 1);
        assert_eq!(cycle.current_transform()(frame.clone()), frame);
    }

    #[test]
    fn test_advance_wraps_through_none() {
        let mut cycle = cycle();
        assert_eq!(cycle.advance(), Some("invert"));
        assert_eq!(cycle.advance(), Some("grayscale"));
        assert_eq!(cycle.advance(), None);
        assert_eq!(cycle.advance(), Some("invert"));
    }

    #[test]
    fn test_empty_cycle_stays_inactive() {
        let mut cycle = ModelCycle::default();
        assert!(cycle.is_empty());
        assert_eq!(cycle.advance(), None);
        assert_eq!(cycle.advance(), None);
    }

    #[test]
    fn test_current_transform_follows_active_model() {
        let mut cycle = cycle();
        cycle.advance();
        let frame = Frame::solid(1, 1, [0, 0, 0, 255], 1);
        assert_eq!(cycle.current_transform()(frame).pixels(), &[255, 255, 255, 255]);
    }
}
