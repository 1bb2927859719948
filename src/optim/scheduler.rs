//! Learning rate schedulers

use super::Optimizer;
use crate::{Error, Result};
use std::f32::consts::PI;

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Advance one epoch and push the new learning rate into the optimizer
    fn step(&mut self);

    /// Index of the last completed epoch (0 right after construction)
    fn last_epoch(&self) -> usize;
}

/// Cosine Annealing Learning Rate Scheduler
///
/// Wraps an optimizer and anneals its learning rate from the value it had at
/// construction (`base_lr`) down to `eta_min` over `t_max` epochs.
///
/// Formula: lr_t = eta_min + 0.5 * (base_lr - eta_min) * (1 + cos(π * t / t_max))
///
/// The formula is applied as-is past `t_max`, so the rate climbs back toward
/// `base_lr` on the next half period.
pub struct CosineAnnealingLR<O: Optimizer> {
    optimizer: O,
    base_lr: f32,
    eta_min: f32,
    t_max: usize,
    last_epoch: usize,
}

impl<O: Optimizer> CosineAnnealingLR<O> {
    /// Wrap `optimizer`, using its current learning rate as `base_lr`
    ///
    /// # Arguments
    /// * `optimizer` - Optimizer whose learning rate is driven by the schedule
    /// * `t_max` - Number of epochs in a half period, must be > 0
    /// * `eta_min` - Minimum learning rate
    pub fn new(optimizer: O, t_max: usize, eta_min: f32) -> Result<Self> {
        if t_max == 0 {
            return Err(Error::InvalidParameter(
                "Invalid T_max: 0 (must be > 0)".to_string(),
            ));
        }
        let base_lr = optimizer.lr();
        Ok(Self {
            optimizer,
            base_lr,
            eta_min,
            t_max,
            last_epoch: 0,
        })
    }

    /// Learning rate at `epoch`, independent of the scheduler's position
    pub fn lr_at(&self, epoch: usize) -> f32 {
        let progress = epoch as f32 / self.t_max as f32;
        let cosine_decay = 0.5 * (1.0 + (PI * progress).cos());
        self.eta_min + (self.base_lr - self.eta_min) * cosine_decay
    }

    pub fn base_lr(&self) -> f32 {
        self.base_lr
    }

    pub fn eta_min(&self) -> f32 {
        self.eta_min
    }

    pub fn t_max(&self) -> usize {
        self.t_max
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    pub fn optimizer_mut(&mut self) -> &mut O {
        &mut self.optimizer
    }

    /// Release the wrapped optimizer
    pub fn into_inner(self) -> O {
        self.optimizer
    }
}

impl<O: Optimizer> LRScheduler for CosineAnnealingLR<O> {
    fn get_lr(&self) -> f32 {
        self.lr_at(self.last_epoch)
    }

    fn step(&mut self) {
        self.last_epoch += 1;
        let lr = self.get_lr();
        self.optimizer.set_lr(lr);
    }

    fn last_epoch(&self) -> usize {
        self.last_epoch
    }
}

impl<O: Optimizer + std::fmt::Debug> std::fmt::Debug for CosineAnnealingLR<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosineAnnealingLR")
            .field("optimizer", &self.optimizer)
            .field("base_lr", &self.base_lr)
            .field("eta_min", &self.eta_min)
            .field("t_max", &self.t_max)
            .field("last_epoch", &self.last_epoch)
            .finish()
    }
}
