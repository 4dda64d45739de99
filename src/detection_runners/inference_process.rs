use std::path::Path;
use std::sync::Arc;
use anyhow::Result;
use crate::common::{DetectorConfig, InferenceDevice};
use crate::data::X;

/// A loaded model that can be run against pre-allocated tensor buffers.
pub trait Interpreter: Send {
    /// Output tensor dimensions as reported by the model; non-positive entries are dynamic.
    fn output_shape(&self) -> Vec<i64>;

    /// Runs the model on `input`, filling `output` in place.
    fn invoke(&mut self, input: &X, output: &mut X) -> Result<()>;

    /// Where inference actually runs, after any accelerator fallback.
    fn backend(&self) -> InferenceDevice;
}

/// Builds an interpreter for a resolved model file.
pub type InterpreterFactory =
    Arc<dyn Fn(&Path, &DetectorConfig) -> Result<Box<dyn Interpreter>> + Send + Sync>;

pub fn interpreter_factory<F>(f: F) -> InterpreterFactory
where
    F: Fn(&Path, &DetectorConfig) -> Result<Box<dyn Interpreter>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// `[1, 4 + classes, anchors]` with dynamic entries resolved from the input side and class count.
///
/// Anchors default to the three-stride grid (8, 16, 32) a 640 input turns into 8400.
pub fn resolve_output_shape(shape: &[i64], side: u32, nc: usize) -> Vec<usize> {
    let anchors: usize = [8u32, 16, 32]
        .iter()
        .map(|s| ((side / s) as usize).pow(2))
        .sum();
    let defaults = [1, 4 + nc, anchors];

    if shape.len() != 3 {
        return defaults.to_vec();
    }
    shape
        .iter()
        .zip(defaults)
        .map(|(&dim, default)| if dim > 0 { dim as usize } else { default })
        .collect()
}
