use std::fmt;
use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::common::InferenceDevice;

pub const MODEL_FILENAME: &str = "yolo11s.onnx";
/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 640;
pub const NUM_CLASSES: usize = 80;
/// Intra-op threads used by the software execution path.
pub const NUM_THREADS: usize = 4;
pub const CONFIDENCE_THRESHOLD: f32 = 0.3;
pub const IOU_THRESHOLD: f32 = 0.5;
/// Input/output buffers are reallocated every this many inferences.
pub const BUFFER_REFRESH_INTERVAL: usize = 25;
/// Padding color of the letterbox canvas (black).
pub const LETTERBOX_FILL: u8 = 0;
/// Run detection on every this many rendered frames.
pub const DETECTION_INTERVAL: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: String,
    pub ort_lib_path: Option<String>,
    pub inference_device: InferenceDevice,
    pub input_size: u32,
    pub num_classes: usize,
    pub num_threads: usize,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub buffer_refresh_interval: usize,
    pub letterbox_fill: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: MODEL_FILENAME.to_string(),
            ort_lib_path: None,
            inference_device: InferenceDevice::CUDA(0),
            input_size: INPUT_SIZE,
            num_classes: NUM_CLASSES,
            num_threads: NUM_THREADS,
            conf_threshold: CONFIDENCE_THRESHOLD,
            iou_threshold: IOU_THRESHOLD,
            buffer_refresh_interval: BUFFER_REFRESH_INTERVAL,
            letterbox_fill: LETTERBOX_FILL,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads a JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read detector config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid detector config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            anyhow::bail!("input_size must be positive");
        }
        if self.num_classes == 0 {
            anyhow::bail!("num_classes must be positive");
        }
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            anyhow::bail!("conf_threshold {} outside [0, 1]", self.conf_threshold);
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!("iou_threshold {} outside [0, 1]", self.iou_threshold);
        }
        Ok(())
    }

    pub fn with_model(mut self, model_path: &str) -> Self {
        self.model_path = model_path.to_string();
        self
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: &str) -> Self {
        self.ort_lib_path = Some(ort_lib_path.to_string());
        self
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.inference_device = device;
        self
    }

    pub fn with_input_size(mut self, side: u32) -> Self {
        self.input_size = side;
        self
    }

    pub fn with_nc(mut self, nc: usize) -> Self {
        self.num_classes = nc;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn with_conf(mut self, x: f32) -> Self {
        self.conf_threshold = x;
        self
    }

    pub fn with_iou(mut self, x: f32) -> Self {
        self.iou_threshold = x;
        self
    }

    pub fn with_buffer_refresh_interval(mut self, n: usize) -> Self {
        self.buffer_refresh_interval = n;
        self
    }
}

impl fmt::Display for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model Path: {}\n\
        OnnxRuntime Lib Path: {}\n\
        Inference Device: {}\n\
        Model Input Resolution: {}x{}\n\
        Classes: {}\n\
        Detection Threshold: {} | IoU Threshold: {}",
               self.model_path,
               self.ort_lib_path.as_deref().unwrap_or("<system>"),
               self.inference_device,
               self.input_size, self.input_size,
               self.num_classes,
               self.conf_threshold, self.iou_threshold)
    }
}

/// Orchestrator pacing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection_interval: u32,
    /// Depth statistics are logged every this many frames.
    pub depth_log_interval: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_interval: DETECTION_INTERVAL,
            depth_log_interval: 30,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.detection_interval == 0 {
            anyhow::bail!("detection_interval must be positive");
        }
        if self.depth_log_interval == 0 {
            anyhow::bail!("depth_log_interval must be positive");
        }
        Ok(())
    }

    pub fn with_detection_interval(mut self, n: u32) -> Self {
        self.detection_interval = n.max(1);
        self
    }
}
