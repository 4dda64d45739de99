use std::sync::Arc;
use crate::common::{Detection, DetectionWithDepth};
use crate::data::DepthImage;

/// Immutable copy of one 16-bit depth frame.
///
/// A decoded value of 0 means "no depth"; a true zero-range reading cannot be told apart
/// from missing data.
#[derive(Debug, Clone)]
pub struct DepthSnapshot {
    buffer: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub pixel_stride: usize,
    pub row_stride: usize,
}

impl DepthSnapshot {
    pub fn new(buffer: Vec<u8>, width: u32, height: u32, pixel_stride: usize, row_stride: usize) -> Self {
        Self {
            buffer: buffer.into(),
            width,
            height,
            pixel_stride,
            row_stride,
        }
    }

    pub fn from_image(image: &DepthImage) -> Self {
        Self::new(
            image.plane.data.clone(),
            image.width,
            image.height,
            image.plane.pixel_stride,
            image.plane.row_stride,
        )
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Depth in millimeters at pixel `(x, y)`, or 0 when out of range.
    pub fn millimeters_at(&self, x: u32, y: u32) -> u32 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let offset = y as usize * self.row_stride + x as usize * self.pixel_stride;
        if offset + 1 >= self.buffer.len() {
            return 0;
        }
        u16::from_le_bytes([self.buffer[offset], self.buffer[offset + 1]]) as u32
    }

    /// Depth at a normalized point, coerced into the depth map bounds.
    pub fn millimeters_at_normalized(&self, nx: f32, ny: f32) -> u32 {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let px = to_pixel(nx, self.width);
        let py = to_pixel(ny, self.height);
        self.millimeters_at(px, py)
    }
}

fn to_pixel(n: f32, extent: u32) -> u32 {
    let p = (n * extent as f32) as i64;
    p.clamp(0, extent as i64 - 1) as u32
}

/// Pairs every detection with the depth at its box center. No snapshot means distance 0.
pub fn fuse_depth(detections: Vec<Detection>, depth: Option<&DepthSnapshot>) -> Vec<DetectionWithDepth> {
    detections
        .into_iter()
        .map(|detection| {
            let (cx, cy) = detection.center();
            let distance = depth.map(|d| d.millimeters_at_normalized(cx, cy)).unwrap_or(0);
            DetectionWithDepth::new(detection, distance)
        })
        .collect()
}
