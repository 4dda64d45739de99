use serde::{Deserialize, Serialize};
use crate::common::BoundingBox;
use crate::detection_runners::ort_detector::nms::Nms;

/// One detected object, with its box in normalized frame coordinates.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Nms for Detection {
    fn iou(&self, other: &Self) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn class_id(&self) -> usize {
        self.class_id
    }
}

impl Detection {
    pub fn new(class_id: usize, label: &str, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    /// Center of the box in normalized coordinates.
    pub fn center(&self) -> (f32, f32) {
        (self.bbox.cx(), self.bbox.cy())
    }
}

/// A detection annotated with the fused distance in millimeters (0 when unknown).
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionWithDepth {
    pub detection: Detection,
    pub distance_mm: u32,
}

impl DetectionWithDepth {
    pub fn new(detection: Detection, distance_mm: u32) -> Self {
        Self { detection, distance_mm }
    }

    pub fn has_distance(&self) -> bool {
        self.distance_mm > 0
    }
}
