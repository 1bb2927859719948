//! Loss functions for training

use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1};

/// How per-sample losses are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Reduction {
    /// Keep per-sample losses
    None,
    /// Weighted mean over the batch
    #[default]
    Mean,
    /// Sum over the batch
    Sum,
}

/// Result of a loss evaluation
#[derive(Clone, Debug)]
pub struct LossOutput {
    /// Weighted loss of each sample
    pub per_sample: Array1<f32>,
    /// Reduced loss; `None` under `Reduction::None`
    pub loss: Option<f32>,
    /// Gradient of the reduced loss w.r.t. the logits
    ///
    /// Under `Reduction::None` this is the gradient of the per-sample sum.
    pub grad: Array2<f32>,
}

/// Trait for loss functions
pub trait LossFn: Send {
    /// Compute loss for a batch of logits (rows = samples) and class targets
    fn forward(&self, logits: &Array2<f32>, targets: &[usize]) -> Result<LossOutput>;

    /// Name of the loss function
    fn name(&self) -> &str;
}

/// Cross Entropy Loss for multi-class classification
///
/// l_i = -w[y_i] * log(softmax(x_i)[y_i])
///
/// With `Reduction::Mean` the batch loss is `Σ l_i / Σ w[y_i]`, which is the
/// plain mean when no class weights are set.
///
/// # Example
///
/// ```
/// use preparar::train::{CrossEntropyLoss, LossFn};
/// use ndarray::array;
///
/// let loss_fn = CrossEntropyLoss::new();
/// let logits = array![[2.0, 1.0, 0.5], [0.1, 0.2, 3.0]];
///
/// let out = loss_fn.forward(&logits, &[0, 2]).unwrap();
/// assert!(out.loss.unwrap() > 0.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CrossEntropyLoss {
    weight: Option<Array1<f32>>,
    reduction: Reduction,
}

impl CrossEntropyLoss {
    /// Unweighted cross entropy with mean reduction
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-class rescaling weights, one entry per class
    pub fn with_weight(mut self, weight: Array1<f32>) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn weight(&self) -> Option<&Array1<f32>> {
        self.weight.as_ref()
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    fn log_softmax(x: ArrayView1<f32>) -> Array1<f32> {
        let max = x.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum_exp = x.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
        x.mapv(|v| v - log_sum_exp)
    }
}

impl LossFn for CrossEntropyLoss {
    fn forward(&self, logits: &Array2<f32>, targets: &[usize]) -> Result<LossOutput> {
        let (batch, num_classes) = logits.dim();
        if targets.len() != batch {
            return Err(Error::ShapeMismatch {
                expected: vec![batch],
                got: vec![targets.len()],
            });
        }
        if let Some(weight) = &self.weight {
            if weight.len() != num_classes {
                return Err(Error::ShapeMismatch {
                    expected: vec![num_classes],
                    got: vec![weight.len()],
                });
            }
        }

        let mut per_sample = Array1::zeros(batch);
        let mut grad = Array2::zeros((batch, num_classes));
        let mut weight_sum = 0.0f32;

        for (i, (row, &target)) in logits.outer_iter().zip(targets).enumerate() {
            if target >= num_classes {
                return Err(Error::TargetOutOfRange {
                    target,
                    num_classes,
                });
            }
            let w = self.weight.as_ref().map_or(1.0, |w| w[target]);
            let log_probs = Self::log_softmax(row);

            per_sample[i] = -w * log_probs[target];
            weight_sum += w;

            // d(l_i)/d(x_i) = w * (softmax(x_i) - onehot(y_i))
            let mut grad_row = grad.row_mut(i);
            grad_row.assign(&log_probs.mapv(|lp| lp.exp() * w));
            grad_row[target] -= w;
        }

        let loss = match self.reduction {
            Reduction::None => None,
            Reduction::Sum => Some(per_sample.sum()),
            Reduction::Mean => {
                grad /= weight_sum;
                Some(per_sample.sum() / weight_sum)
            }
        };

        Ok(LossOutput {
            per_sample,
            loss,
            grad,
        })
    }

    fn name(&self) -> &str {
        "CrossEntropy"
    }
}
