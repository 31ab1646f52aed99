//! Frame type representing a captured image with metadata.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pixel layout of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 32-bit blue, green, red, alpha; one byte per channel.
    #[default]
    Bgra32,
}

impl PixelFormat {
    /// Bytes occupied by a single pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra32 => 4,
        }
    }
}

/// A single captured frame from the camera.
///
/// Frames move by value through the pipeline: camera, transform, then
/// delivery callback. The pipeline never keeps one past a processing cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Row-major pixel data, `width * bytes_per_pixel` bytes per row.
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Presentation timestamp relative to the start of the stream.
    timestamp: Duration,
    /// Monotonic sequence number assigned by the camera.
    sequence: u64,
}

impl Frame {
    /// Creates a new BGRA frame.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, timestamp: Duration, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            format: PixelFormat::Bgra32,
            timestamp,
            sequence,
        }
    }

    /// Creates a frame where every pixel has the same BGRA value.
    pub fn solid(width: u32, height: u32, bgra: [u8; 4], sequence: u64) -> Self {
        let pixels = bgra
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(pixels, width, height, Duration::ZERO, sequence)
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns a mutable reference to the raw pixel data.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Consumes the frame, returning its pixel buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Replaces the pixel buffer, keeping dimensions and timing.
    pub fn with_pixels(self, pixels: Vec<u8>) -> Self {
        Self { pixels, ..self }
    }

    /// Iterates over pixels as mutable `[b, g, r, a]` slices.
    pub fn bgra_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.pixels.chunks_exact_mut(4)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the presentation timestamp.
    #[inline]
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of bytes in one row of pixels.
    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions and format.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// Returns true if `other` has the same dimensions and format.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp", &self.timestamp)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 640 * 480 * 4];
        let frame = Frame::new(pixels, 640, 480, Duration::from_millis(66), 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.bytes_per_row(), 2560);
        assert_eq!(frame.timestamp(), Duration::from_millis(66));
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        // One byte per pixel is not BGRA
        let frame = Frame::new(vec![0u8; 640 * 480], 640, 480, Duration::ZERO, 1);
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_solid_frame_layout() {
        let frame = Frame::solid(3, 2, [1, 2, 3, 255], 7);
        assert!(frame.is_valid());
        assert_eq!(&frame.pixels()[..8], &[1, 2, 3, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn test_with_pixels_keeps_metadata() {
        let frame = Frame::solid(2, 2, [0, 0, 0, 255], 9);
        let replaced = frame.clone().with_pixels(vec![9u8; 16]);

        assert!(replaced.same_shape(&frame));
        assert_eq!(replaced.sequence(), 9);
        assert_ne!(replaced, frame);
    }
}
