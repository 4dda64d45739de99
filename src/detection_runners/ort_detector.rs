mod ort_engine;
mod yolo_detector;
pub mod image_ops;
pub mod input_wrapper;
pub mod nms;

pub use ort_engine::*;
pub use yolo_detector::*;
