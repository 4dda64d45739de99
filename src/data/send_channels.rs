use crossbeam_channel::{Receiver, Sender};
use image::RgbImage;
use crate::common::DetectionWithDepth;

/// Display overlay. An empty list clears every box currently shown.
pub trait DetectionSink: Send + Sync {
    fn publish(&self, detections: Vec<DetectionWithDepth>);
}

/// Receives on-demand captures; `None` when the frame could not be converted.
pub trait CaptureSink: Send + Sync {
    fn deliver(&self, image: Option<RgbImage>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Background announcements; never interrupt other speech.
    Low,
    /// User-triggered announcements.
    High,
}

/// Spoken feedback for scene changes.
pub trait Announcer: Send + Sync {
    fn announce(&self, text: String, priority: Priority);
}

impl DetectionSink for Sender<Vec<DetectionWithDepth>> {
    fn publish(&self, detections: Vec<DetectionWithDepth>) {
        if self.send(detections).is_err() {
            log::debug!("Overlay receiver dropped, detections discarded");
        }
    }
}

impl CaptureSink for Sender<Option<RgbImage>> {
    fn deliver(&self, image: Option<RgbImage>) {
        if self.send(image).is_err() {
            log::debug!("Capture receiver dropped, capture discarded");
        }
    }
}

impl Announcer for Sender<(String, Priority)> {
    fn announce(&self, text: String, priority: Priority) {
        if self.send((text, priority)).is_err() {
            log::debug!("Announcement receiver dropped");
        }
    }
}

/// Receiving ends the UI thread drains.
#[derive(Debug)]
pub struct UiReceivers {
    pub det_rx: Receiver<Vec<DetectionWithDepth>>,
    pub capture_rx: Receiver<Option<RgbImage>>,
}

/// Sending ends handed to the pipeline.
#[derive(Debug, Clone)]
pub struct UiSenders {
    pub det_tx: Sender<Vec<DetectionWithDepth>>,
    pub capture_tx: Sender<Option<RgbImage>>,
}

/// Unbounded channels marshalling pipeline output onto the UI thread.
pub fn ui_channels() -> (UiSenders, UiReceivers) {
    let (det_tx, det_rx) = crossbeam_channel::unbounded();
    let (capture_tx, capture_rx) = crossbeam_channel::unbounded();
    (UiSenders { det_tx, capture_tx }, UiReceivers { det_rx, capture_rx })
}
