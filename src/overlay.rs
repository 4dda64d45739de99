//! Screen-space geometry for drawing detections over the camera view.

use serde::Serialize;
use crate::common::{BoundingBox, DetectionWithDepth};

/// Size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One box ready to be drawn, in view pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub confidence: String,
}

impl OverlayBox {
    /// Maps a detection from the rotated model frame back onto the upright view.
    pub fn layout(item: &DetectionWithDepth, viewport: Viewport) -> Self {
        let b: &BoundingBox = &item.detection.bbox;
        let (vw, vh) = (viewport.width as f32, viewport.height as f32);

        let x = b.y;
        let y = 1.0 - (b.x + b.w);
        let w = b.h;
        let h = b.w;

        Self {
            left: x * vw,
            top: y * vh,
            width: w * vw,
            height: h * vh,
            label: format!("{} - {}", item.detection.label, short_distance(item.distance_mm)),
            confidence: format!("{:.1}%", item.detection.confidence * 100.0),
        }
    }
}

/// "Nmm", "X.Xm" or "unknown".
pub fn short_distance(distance_mm: u32) -> String {
    match distance_mm {
        0 => "unknown".to_string(),
        mm if mm < 1000 => format!("{mm}mm"),
        mm => format!("{:.1}m", mm as f32 / 1000.0),
    }
}

/// Lays out every detection; an empty input clears the overlay.
pub fn layout_all(items: &[DetectionWithDepth], viewport: Viewport) -> Vec<OverlayBox> {
    items.iter().map(|item| OverlayBox::layout(item, viewport)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Detection;

    #[test]
    fn compensates_quarter_turn() {
        let item = DetectionWithDepth::new(
            Detection::new(0, "person", 0.876, BoundingBox::new(0.1, 0.2, 0.3, 0.4)),
            1530,
        );
        let b = OverlayBox::layout(&item, Viewport { width: 1000, height: 2000 });
        assert!((b.left - 200.0).abs() < 1e-3);
        assert!((b.top - 1200.0).abs() < 1e-3);
        assert!((b.width - 400.0).abs() < 1e-3);
        assert!((b.height - 600.0).abs() < 1e-3);
        assert_eq!(b.label, "person - 1.5m");
        assert_eq!(b.confidence, "87.6%");
    }

    #[test]
    fn distance_labels() {
        assert_eq!(short_distance(0), "unknown");
        assert_eq!(short_distance(450), "450mm");
        assert_eq!(short_distance(1000), "1.0m");
    }
}
