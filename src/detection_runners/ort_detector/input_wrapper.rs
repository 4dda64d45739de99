use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};

/// Tensor buffer handed to and filled by the interpreter, wrapper over [`Array<f32, IxDyn>`].
#[derive(Debug, Clone, Default)]
pub struct X(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for X {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl std::ops::Deref for X {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for X {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl X {
    /// Freshly allocated, zeroed, contiguous buffer.
    pub fn zeros(shape: &[usize]) -> Self {
        Self(Array::zeros(IxDyn(shape)))
    }

    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(shape, xs)?))
    }

    pub fn ndim(&self) -> usize {
        self.0.ndim()
    }

    pub fn nbytes(&self) -> usize {
        self.0.len() * std::mem::size_of::<f32>()
    }

    pub fn data(&self) -> Result<&[f32]> {
        self.0.as_slice().context("Tensor buffer is not contiguous")
    }

    pub fn data_mut(&mut self) -> Result<&mut [f32]> {
        self.0.as_slice_mut().context("Tensor buffer is not contiguous")
    }
}
