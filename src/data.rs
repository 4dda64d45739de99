mod camera_image;
mod cancel_token;
mod depth_snapshot;
mod filesystem_access;
mod time_calc;
pub mod send_channels;

pub use camera_image::*;
pub use cancel_token::{CancelToken, CaptureTrigger};
pub use depth_snapshot::{fuse_depth, DepthSnapshot};
pub use send_channels::{ui_channels, Announcer, CaptureSink, DetectionSink, Priority, UiReceivers, UiSenders};

pub use crate::detection_runners::ort_detector::image_ops::LetterboxTransform;
pub use crate::detection_runners::ort_detector::input_wrapper::X;

pub use filesystem_access::FsAccess;
pub use time_calc::TimeCalc;

pub(crate) const CROSS_MARK: &str = "❌";
