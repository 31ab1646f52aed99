//! Simple BGRA colour filters standing in for style models.

use super::{FrameModel, InferenceError};
use crate::capture::Frame;

/// Inverts colour channels, keeping alpha.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invert;

/// ITU-R BT.601 luma.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

/// Classic sepia tone matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sepia;

fn check_input(model: &str, frame: &Frame) -> Result<(), InferenceError> {
    if frame.is_valid() {
        Ok(())
    } else {
        Err(InferenceError::InvalidInput {
            model: model.to_string(),
            reason: format!("{:?} does not match its dimensions", frame),
        })
    }
}

/// Applies `f` to each `[b, g, r]` triple of a copy of `frame`.
fn map_bgr(frame: &Frame, f: impl Fn(u8, u8, u8) -> [u8; 3]) -> Frame {
    let mut output = frame.clone();
    for px in output.bgra_mut() {
        let [b, g, r] = f(px[0], px[1], px[2]);
        px[0] = b;
        px[1] = g;
        px[2] = r;
    }
    output
}

impl FrameModel for Invert {
    fn name(&self) -> &str {
        "invert"
    }

    fn predict(&self, frame: &Frame) -> Result<Frame, InferenceError> {
        check_input(self.name(), frame)?;
        Ok(map_bgr(frame, |b, g, r| [!b, !g, !r]))
    }
}

impl FrameModel for Grayscale {
    fn name(&self) -> &str {
        "grayscale"
    }

    fn predict(&self, frame: &Frame) -> Result<Frame, InferenceError> {
        check_input(self.name(), frame)?;
        Ok(map_bgr(frame, |b, g, r| {
            let luma = ((299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000) as u8;
            [luma; 3]
        }))
    }
}

impl FrameModel for Sepia {
    fn name(&self) -> &str {
        "sepia"
    }

    fn predict(&self, frame: &Frame) -> Result<Frame, InferenceError> {
        check_input(self.name(), frame)?;
        Ok(map_bgr(frame, |b, g, r| {
            let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
            let tone = |cr: f32, cg: f32, cb: f32| (r * cr + g * cg + b * cb).min(255.0) as u8;
            [
                tone(0.272, 0.534, 0.131),
                tone(0.349, 0.686, 0.168),
                tone(0.393, 0.769, 0.189),
            ]
        }))
    }
}
