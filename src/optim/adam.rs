//! Adam optimizer

use super::Optimizer;
use crate::{Error, Result, Tensor};
use ndarray::Array1;

/// Hyperparameters for [`Adam`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdamConfig {
    pub lr: f32,
    pub betas: (f32, f32),
    pub eps: f32,
    /// L2 penalty, added to the gradient before the moment update
    pub weight_decay: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }
}

impl AdamConfig {
    /// Default betas and eps with the given learning rate
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.betas = (beta1, beta2);
        self
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.lr.is_nan() || self.lr < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Invalid learning rate: {}",
                self.lr
            )));
        }
        if self.eps.is_nan() || self.eps < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Invalid epsilon value: {}",
                self.eps
            )));
        }
        let (beta1, beta2) = self.betas;
        if !(0.0..1.0).contains(&beta1) {
            return Err(Error::InvalidParameter(format!(
                "Invalid beta parameter at index 0: {beta1}"
            )));
        }
        if !(0.0..1.0).contains(&beta2) {
            return Err(Error::InvalidParameter(format!(
                "Invalid beta parameter at index 1: {beta2}"
            )));
        }
        if self.weight_decay.is_nan() || self.weight_decay < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "Invalid weight_decay value: {}",
                self.weight_decay
            )));
        }
        Ok(())
    }
}

/// Adam optimizer (Adaptive Moment Estimation) with L2 weight decay
///
/// Update rule per trainable parameter θ with gradient g:
///
/// ```text
/// g   = g + λ·θ
/// m_t = β1·m + (1 - β1)·g
/// v_t = β2·v + (1 - β2)·g²
/// θ   = θ - lr/(1 - β1^t) · m_t / (√v_t / √(1 - β2^t) + ε)
/// ```
#[derive(Clone, Debug)]
pub struct Adam {
    config: AdamConfig,
    /// Lengths of the trainable parameters this optimizer was bound to
    shapes: Vec<usize>,
    steps: Vec<u64>,
    m: Vec<Option<Array1<f32>>>, // First moment
    v: Vec<Option<Array1<f32>>>, // Second moment
}

impl Adam {
    /// Bind a new Adam optimizer to the trainable tensors in `params`
    ///
    /// Fails with `Error::EmptyParameters` when nothing in `params` requires a
    /// gradient, and with `Error::InvalidParameter` on out-of-range hyperparameters.
    pub fn new<'a, I>(params: I, config: AdamConfig) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Tensor>,
    {
        config.validate()?;

        let shapes: Vec<usize> = params
            .into_iter()
            .filter(|p| p.requires_grad())
            .map(Tensor::len)
            .collect();
        if shapes.is_empty() {
            return Err(Error::EmptyParameters);
        }

        let n = shapes.len();
        Ok(Self {
            config,
            shapes,
            steps: vec![0; n],
            m: vec![None; n],
            v: vec![None; n],
        })
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn weight_decay(&self) -> f32 {
        self.config.weight_decay
    }

    /// Number of trainable parameters the optimizer is bound to
    pub fn num_parameters(&self) -> usize {
        self.shapes.len()
    }

    /// Steps taken for the i-th bound parameter
    pub fn param_steps(&self, i: usize) -> Option<u64> {
        self.steps.get(i).copied()
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Tensor]) -> Result<()> {
        let mut trainable: Vec<&mut Tensor> =
            params.iter_mut().filter(|p| p.requires_grad()).collect();
        if trainable.len() != self.shapes.len() {
            return Err(Error::ParameterMismatch {
                bound: self.shapes.len(),
                got: trainable.len(),
            });
        }

        let AdamConfig {
            lr,
            betas: (beta1, beta2),
            eps,
            weight_decay,
        } = self.config;

        for (i, param) in trainable.iter_mut().enumerate() {
            if param.len() != self.shapes[i] {
                return Err(Error::ShapeMismatch {
                    expected: vec![self.shapes[i]],
                    got: vec![param.len()],
                });
            }
            let Some(grad) = param.grad() else {
                continue;
            };

            let grad = if weight_decay != 0.0 {
                grad + &(param.data() * weight_decay)
            } else {
                grad.clone()
            };

            self.steps[i] += 1;
            let t = self.steps[i] as i32;

            // m_t = β1 * m_{t-1} + (1 - β1) * g
            let m_t = match &self.m[i] {
                Some(m) => m * beta1 + &grad * (1.0 - beta1),
                None => &grad * (1.0 - beta1),
            };

            // v_t = β2 * v_{t-1} + (1 - β2) * g²
            let grad_sq = &grad * &grad;
            let v_t = match &self.v[i] {
                Some(v) => v * beta2 + &grad_sq * (1.0 - beta2),
                None => &grad_sq * (1.0 - beta2),
            };

            let bias_correction1 = 1.0 - beta1.powi(t);
            let bias_correction2_sqrt = (1.0 - beta2.powi(t)).sqrt();
            let step_size = lr / bias_correction1;

            let denom = v_t.mapv(|x| x.sqrt() / bias_correction2_sqrt + eps);
            let update = &m_t / &denom * step_size;
            *param.data_mut() -= &update;

            self.m[i] = Some(m_t);
            self.v[i] = Some(v_t);
        }

        Ok(())
    }

    fn lr(&self) -> f32 {
        self.config.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.config.lr = lr;
    }

    fn name(&self) -> &str {
        "Adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn params(values: Vec<f32>) -> Vec<Tensor> {
        vec![Tensor::from_vec(values, true)]
    }

    #[test]
    fn test_adam_quadratic_convergence() {
        // f(x) = x², ∇f = 2x
        let mut params = params(vec![5.0, -3.0, 2.0]);
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();

        for _ in 0..200 {
            let grad = params[0].data().mapv(|x| 2.0 * x);
            params[0].set_grad(grad).unwrap();
            optimizer.step(&mut params).unwrap();
        }

        for &val in params[0].data().iter() {
            assert!(val.abs() < 0.5, "Value {} did not converge", val);
        }
    }

    #[test]
    fn test_first_step_moves_by_lr() {
        // After bias correction the first update is lr * sign(g)
        let mut params = params(vec![1.0, 1.0]);
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();

        params[0].set_grad(arr1(&[0.5, -2.0])).unwrap();
        optimizer.step(&mut params).unwrap();

        assert_abs_diff_eq!(params[0].data()[0], 0.9, epsilon = 1e-5);
        assert_abs_diff_eq!(params[0].data()[1], 1.1, epsilon = 1e-5);
    }

    #[test]
    fn test_weight_decay_acts_on_zero_gradient() {
        let mut params = params(vec![1.0]);
        let config = AdamConfig::new(0.1).with_weight_decay(0.1);
        let mut optimizer = Adam::new(&params, config).unwrap();

        params[0].set_grad(arr1(&[0.0])).unwrap();
        optimizer.step(&mut params).unwrap();

        // g = 0 + 0.1 * 1.0, first step moves by lr against the sign of g
        assert_abs_diff_eq!(params[0].data()[0], 0.9, epsilon = 1e-5);
    }

    #[test]
    fn test_without_weight_decay_zero_gradient_is_noop() {
        let mut params = params(vec![1.0]);
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();

        params[0].set_grad(arr1(&[0.0])).unwrap();
        optimizer.step(&mut params).unwrap();

        assert_abs_diff_eq!(params[0].data()[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_parameters_rejected() {
        let params: Vec<Tensor> = Vec::new();
        let err = Adam::new(&params, AdamConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyParameters));
    }

    #[test]
    fn test_frozen_only_parameters_rejected() {
        let params = vec![Tensor::zeros(3, false)];
        let err = Adam::new(&params, AdamConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyParameters));
    }

    #[test]
    fn test_invalid_hyperparameters() {
        let params = params(vec![1.0]);
        for config in [
            AdamConfig::new(-0.1),
            AdamConfig::new(0.1).with_eps(-1.0),
            AdamConfig::new(0.1).with_betas(1.0, 0.999),
            AdamConfig::new(0.1).with_betas(0.9, -0.1),
            AdamConfig::new(0.1).with_weight_decay(-0.01),
            AdamConfig::new(f32::NAN),
        ] {
            let err = Adam::new(&params, config).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)), "{config:?}");
        }
    }

    #[test]
    fn test_frozen_parameters_untouched() {
        let mut params = vec![
            Tensor::from_vec(vec![1.0], true),
            Tensor::from_vec(vec![1.0], false),
        ];
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();
        assert_eq!(optimizer.num_parameters(), 1);

        params[0].set_grad(arr1(&[1.0])).unwrap();
        params[1].set_grad(arr1(&[1.0])).unwrap();
        optimizer.step(&mut params).unwrap();

        assert!(params[0].data()[0] < 1.0);
        assert_eq!(params[1].data()[0], 1.0);
    }

    #[test]
    fn test_step_skips_missing_gradients() {
        let mut params = vec![Tensor::zeros(2, true), Tensor::from_vec(vec![1.0], true)];
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();

        params[1].set_grad(arr1(&[1.0])).unwrap();
        optimizer.step(&mut params).unwrap();

        assert_eq!(optimizer.param_steps(0), Some(0));
        assert_eq!(optimizer.param_steps(1), Some(1));
        assert_eq!(params[0].data().to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_step_rejects_different_parameter_set() {
        let params = params(vec![1.0]);
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();

        let mut other = vec![Tensor::zeros(1, true), Tensor::zeros(1, true)];
        let err = optimizer.step(&mut other).unwrap_err();
        assert!(matches!(err, Error::ParameterMismatch { bound: 1, got: 2 }));

        let mut resized = vec![Tensor::zeros(4, true)];
        let err = optimizer.step(&mut resized).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_set_lr() {
        let params = params(vec![1.0]);
        let mut optimizer = Adam::new(&params, AdamConfig::new(0.1)).unwrap();
        optimizer.set_lr(0.05);
        assert_eq!(optimizer.lr(), 0.05);
        assert_eq!(optimizer.name(), "Adam");
    }
}
