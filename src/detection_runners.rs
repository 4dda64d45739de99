mod frame_converter;
pub mod inference_process;
pub mod ort_detector;

pub use frame_converter::*;
pub use inference_process::{interpreter_factory, Interpreter, InterpreterFactory};
pub use ort_detector::*;
