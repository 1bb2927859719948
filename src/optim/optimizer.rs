//! Optimizer trait

use crate::{Result, Tensor};

/// Trait for optimization algorithms
///
/// An optimizer is bound to a model's trainable parameters when it is built.
/// `step` receives the model's full parameter slice and updates only the
/// parameters with `requires_grad() == true`.
pub trait Optimizer: Send {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]) -> Result<()>;

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Short name; the LR monitor logs under `lr-{name}`
    fn name(&self) -> &str;
}
