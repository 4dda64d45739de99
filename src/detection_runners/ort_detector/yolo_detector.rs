use std::time::Instant;
use anyhow::Result;
use image::RgbImage;
use rayon::prelude::*;

use crate::common::{class_label, BoundingBox, Detection, DetectorConfig};
use crate::data::{FsAccess, LetterboxTransform, TimeCalc, X};
use crate::detection_runners::inference_process::{interpreter_factory, resolve_output_shape, Interpreter, InterpreterFactory};
use crate::detection_runners::ort_detector::image_ops;
use crate::detection_runners::ort_detector::nms::non_max_suppression;
use crate::detection_runners::ort_detector::OrtEngine;
use crate::utils;

const PERF_LOG_INTERVAL: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Single-image YOLO detector over a swappable [`Interpreter`].
///
/// Not thread-safe on its own; callers serialize access (the pipeline keeps it behind a mutex).
pub struct YoloDetector {
    config: DetectorConfig,
    factory: InterpreterFactory,
    state: DetectorState,
    interpreter: Option<Box<dyn Interpreter>>,
    input: Option<X>,
    output: Option<X>,
    output_shape: Vec<usize>,
    inference_count: usize,
    allocations: usize,
    timings: TimeCalc,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("state", &self.state)
            .field("output_shape", &self.output_shape)
            .field("inference_count", &self.inference_count)
            .finish()
    }
}

impl YoloDetector {
    /// Detector backed by ONNX Runtime.
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_factory(config, interpreter_factory(|path, config| {
            Ok(Box::new(OrtEngine::new(path, config)?) as Box<dyn Interpreter>)
        }))
    }

    pub fn with_factory(config: DetectorConfig, factory: InterpreterFactory) -> Self {
        Self {
            config,
            factory,
            state: DetectorState::Uninitialized,
            interpreter: None,
            input: None,
            output: None,
            output_shape: Vec::new(),
            inference_count: 0,
            allocations: 0,
            timings: TimeCalc::default(),
        }
    }

    /// Loads the model and allocates buffers. Returns whether the detector is ready.
    ///
    /// A missing model file is not an error: the detector stays unusable and `detect` keeps
    /// returning nothing.
    pub fn initialize(&mut self) -> bool {
        if self.state == DetectorState::Ready {
            return true;
        }
        self.state = DetectorState::Initializing;

        let Some(model_path) = FsAccess::resolve_model(&self.config.model_path) else {
            log::warn!("Model {} not found, detection disabled", self.config.model_path);
            self.state = DetectorState::Uninitialized;
            return false;
        };

        let interpreter = match (self.factory)(&model_path, &self.config) {
            Ok(interpreter) => interpreter,
            Err(e) => {
                log::error!("Failed to load model {}: {e:?}", model_path.display());
                self.state = DetectorState::Uninitialized;
                return false;
            }
        };

        self.output_shape = resolve_output_shape(
            &interpreter.output_shape(),
            self.config.input_size,
            self.config.num_classes,
        );
        log::info!(
            "Detector ready on {} | Input: {}x{} | Output: {:?}",
            interpreter.backend(), self.config.input_size, self.config.input_size, self.output_shape,
        );
        self.interpreter = Some(interpreter);
        self.allocate_buffers();
        self.inference_count = 0;
        self.state = DetectorState::Ready;
        true
    }

    fn allocate_buffers(&mut self) {
        let side = self.config.input_size as usize;
        self.input = Some(X::zeros(&[1, 3, side, side]));
        self.output = Some(X::zeros(&self.output_shape));
        self.allocations += 1;
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == DetectorState::Ready
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn inference_count(&self) -> usize {
        self.inference_count
    }

    /// Detects objects in `image`. Boxes are normalized to the image.
    ///
    /// Any failure is logged and yields an empty list.
    pub fn detect(&mut self, image: &RgbImage) -> Vec<Detection> {
        if !self.is_ready() {
            return Vec::new();
        }

        self.inference_count += 1;
        let refresh = self.config.buffer_refresh_interval;
        if refresh > 0 && self.inference_count % refresh == 0 {
            log::debug!("Reallocating detector buffers after {} inferences", self.inference_count);
            self.allocate_buffers();
        }

        let detect_time = Instant::now();
        let result = self.run(image, detect_time);
        self.timings.add_or_push(0, detect_time.elapsed());

        if self.inference_count % PERF_LOG_INTERVAL == 0 {
            log::info!(
                "Detection performance: {} runs | avg {:.2?} on {}",
                self.inference_count, self.timings.avg(), self.backend_info(),
            );
            self.timings.clear();
        }

        match result {
            Ok(detections) => detections,
            Err(e) => {
                log::error!("Detection failed: {e:?}");
                Vec::new()
            }
        }
    }

    fn run(&mut self, image: &RgbImage, detect_time: Instant) -> Result<Vec<Detection>> {
        let (Some(interpreter), Some(input), Some(output)) =
            (self.interpreter.as_mut(), self.input.as_mut(), self.output.as_mut())
        else {
            anyhow::bail!("Detector buffers are not allocated");
        };

        let mut elapsed = detect_time.elapsed();
        let transform = image_ops::preprocess(
            image,
            self.config.input_size,
            self.config.letterbox_fill,
            input,
        )?;
        elapsed = utils::trace(false, "TIME", "Preprocessing input", detect_time, elapsed);

        interpreter.invoke(input, output)?;
        elapsed = utils::trace(false, "TIME", "Detection run", detect_time, elapsed);

        let mut detections = decode_predictions(
            output.data()?,
            &self.output_shape,
            &self.config,
            &transform,
        )?;
        non_max_suppression(&mut detections, self.config.iou_threshold);
        utils::trace(false, "TIME", "Postprocessing", detect_time, elapsed);

        Ok(detections)
    }

    /// Releases the interpreter and buffers. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == DetectorState::Closed {
            return;
        }
        self.input = None;
        self.output = None;
        self.interpreter = None;
        self.state = DetectorState::Closed;
        log::info!("Detector closed after {} inferences", self.inference_count);
    }

    pub fn backend_info(&self) -> String {
        match &self.interpreter {
            Some(interpreter) if self.is_ready() => interpreter.backend().to_string(),
            _ => "Model not initialized".to_string(),
        }
    }
}

/// Decodes a `[1, 4 + classes, anchors]` output into thresholded detections in image space.
///
/// Each anchor takes its best class (ties keep the lower id); coordinates are canvas pixels
/// in center format.
pub fn decode_predictions(
    output: &[f32],
    shape: &[usize],
    config: &DetectorConfig,
    transform: &LetterboxTransform,
) -> Result<Vec<Detection>> {
    let (features, anchors) = match shape {
        [1, features, anchors] => (*features, *anchors),
        _ => anyhow::bail!("Unexpected output shape {:?}", shape),
    };
    if features < 5 {
        anyhow::bail!("Output has {} features, need at least 5", features);
    }
    if output.len() < features * anchors {
        anyhow::bail!("Output holds {} values, shape {:?} needs {}", output.len(), shape, features * anchors);
    }

    let classes = (features - 4).min(config.num_classes);
    let side = config.input_size as f32;
    let at = |f: usize, i: usize| output[f * anchors + i];

    let detections = (0..anchors)
        .into_par_iter()
        .filter_map(|i| {
            let mut class_id = 0;
            let mut max_score = 0.0f32;
            for c in 0..classes {
                let score = at(4 + c, i);
                if score > max_score {
                    max_score = score;
                    class_id = c;
                }
            }
            if max_score < config.conf_threshold {
                return None;
            }

            let bbox: BoundingBox = transform.unmap_box(
                at(0, i) / side,
                at(1, i) / side,
                at(2, i) / side,
                at(3, i) / side,
            );
            Some(Detection::new(class_id, &class_label(class_id), max_score, bbox))
        })
        .collect();

    Ok(detections)
}
