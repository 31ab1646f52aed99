//! Ready-made per-frame transforms.
//!
//! Inference-backed effects plug into the pipeline through [`FrameModel`].
//! The pipeline never sees a model error: [`model_transform`] falls back to
//! the unmodified frame whenever a model fails.

mod cycle;
mod filters;

pub use cycle::ModelCycle;
pub use filters::{Grayscale, Invert, Sepia};

use crate::capture::Frame;
use crate::pipeline::Transform;
use std::sync::Arc;
use thiserror::Error;

/// Errors a model may report for a single frame.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model {model} rejected input: {reason}")]
    InvalidInput { model: String, reason: String },
    #[error("model {model} failed: {reason}")]
    Failed { model: String, reason: String },
}

/// A synchronous frame-to-frame model, such as a style-transfer network.
pub trait FrameModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Runs the model on one frame.
    fn predict(&self, frame: &Frame) -> Result<Frame, InferenceError>;
}

/// Pass-through transform.
pub fn identity() -> Transform {
    Arc::new(|frame: Frame| frame)
}

/// Wraps `model` as a pipeline transform.
///
/// If the model fails or returns a malformed buffer, the input frame is
/// returned unchanged.
pub fn model_transform(model: Arc<dyn FrameModel>) -> Transform {
    Arc::new(move |frame: Frame| match model.predict(&frame) {
        Ok(output) if output.is_valid() => output,
        Ok(output) => {
            tracing::debug!(
                model = model.name(),
                ?output,
                "Model produced a malformed frame; passing input through"
            );
            frame
        }
        Err(e) => {
            tracing::debug!(model = model.name(), error = %e, "Inference failed; passing input through");
            frame
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl FrameModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn predict(&self, _frame: &Frame) -> Result<Frame, InferenceError> {
            Err(InferenceError::Failed {
                model: "broken".into(),
                reason: "no weights".into(),
            })
        }
    }

    struct Truncating;

    impl FrameModel for Truncating {
        fn name(&self) -> &str {
            "truncating"
        }

        fn predict(&self, frame: &Frame) -> Result<Frame, InferenceError> {
            Ok(frame.clone().with_pixels(vec![0u8; 3]))
        }
    }

    #[test]
    fn test_identity() {
        let frame = Frame::solid(2, 2, [1, 2, 3, 4], 1);
        assert_eq!(identity()(frame.clone()), frame);
    }

    #[test]
    fn test_failing_model_passes_frame_through() {
        let frame = Frame::solid(2, 2, [1, 2, 3, 4], 1);
        assert_eq!(model_transform(Arc::new(Broken))(frame.clone()), frame);
    }

    #[test]
    fn test_malformed_output_passes_frame_through() {
        let frame = Frame::solid(2, 2, [1, 2, 3, 4], 1);
        assert_eq!(model_transform(Arc::new(Truncating))(frame.clone()), frame);
    }

    #[test]
    fn test_working_model_output_is_used() {
        let frame = Frame::solid(1, 1, [10, 20, 30, 255], 1);
        let output = model_transform(Arc::new(Invert))(frame);
        assert_eq!(output.pixels(), &[245, 235, 225, 255]);
    }
}
