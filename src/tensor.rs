//! Parameter tensor with a gradient slot

use ndarray::Array1;

/// Flat parameter buffer as seen by optimizers
///
/// Gradients are produced by whatever engine drives training; this crate only
/// reads them in [`Optimizer::step`](crate::optim::Optimizer::step).
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    data: Array1<f32>,
    grad: Option<Array1<f32>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a new tensor with data
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            data,
            grad: None,
            requires_grad,
        }
    }

    /// Create a tensor from a vector
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a tensor filled with zeros
    pub fn zeros(size: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(size), requires_grad)
    }

    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Get gradient (if one was set since the last `zero_grad`)
    pub fn grad(&self) -> Option<&Array1<f32>> {
        self.grad.as_ref()
    }

    /// Set gradient
    ///
    /// Returns `Error::ShapeMismatch` when the gradient length differs from the data.
    pub fn set_grad(&mut self, grad: Array1<f32>) -> crate::Result<()> {
        if grad.len() != self.data.len() {
            return Err(crate::Error::ShapeMismatch {
                expected: vec![self.data.len()],
                got: vec![grad.len()],
            });
        }
        self.grad = Some(grad);
        Ok(())
    }

    pub fn zero_grad(&mut self) {
        self.grad = None;
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
