mod bbox;
mod coco;
mod detection;
mod detector_config;
mod inference_device;

pub use bbox::*;
pub use coco::*;
pub use detection::*;
pub use detector_config::*;
pub use inference_device::*;
