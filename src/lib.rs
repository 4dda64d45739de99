mod utils;
pub mod announce;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod fusion_pipeline;
pub mod overlay;

use std::time::Instant;
use image::RgbImage;
use crate::common::{DetectionWithDepth, DetectorConfig};
use crate::data::{fuse_depth, DepthSnapshot};

pub use crate::detection_runners::{convert_frame, DetectorState, YoloDetector};
pub use crate::fusion_pipeline::FusionPipeline;

/// Loads the model and runs one blank frame through it so the first real frame is not slowed
/// down by lazy session setup.
pub fn init_detector(config: &DetectorConfig) -> anyhow::Result<YoloDetector> {
    config.validate()?;
    log::info!("Initializing ORT session with ({}) execution provider", config.inference_device);

    let mut detector = YoloDetector::new(config.clone());
    if !detector.initialize() {
        anyhow::bail!("Model {} could not be loaded", config.model_path);
    }
    detector.detect(&RgbImage::new(config.input_size, config.input_size));
    Ok(detector)
}

/// Detects objects in one upright image and joins the optional depth map.
pub fn run_detection(
    detector: &mut YoloDetector,
    image: &RgbImage,
    depth: Option<&DepthSnapshot>,
) -> Vec<DetectionWithDepth> {
    let now = Instant::now();
    let detections = detector.detect(image);
    log::info!("Processing time: {:?} | {} detections", now.elapsed(), detections.len());
    fuse_depth(detections, depth)
}
