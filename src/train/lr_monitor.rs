//! Learning rate logging

use super::callback::{CallbackAction, CallbackContext, TrainerCallback};
use crate::optim::Optimizer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// When [`LearningRateMonitor`] records the learning rate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingInterval {
    /// At the start of every epoch, indexed by epoch
    #[default]
    Epoch,
    /// At the start of every step, indexed by global step
    Step,
}

impl fmt::Display for LoggingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingInterval::Epoch => f.write_str("epoch"),
            LoggingInterval::Step => f.write_str("step"),
        }
    }
}

/// One recorded learning rate
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LrRecord {
    /// Epoch or global step, depending on the interval
    pub index: usize,
    pub lr: f32,
}

/// Callback that logs the learning rate at a fixed interval
#[derive(Clone, Debug)]
pub struct LearningRateMonitor {
    interval: LoggingInterval,
    key: String,
    history: Vec<LrRecord>,
}

impl LearningRateMonitor {
    /// Records under `lr-Adam` until [`with_optimizer`](Self::with_optimizer) names the optimizer
    pub fn new(interval: LoggingInterval) -> Self {
        Self {
            interval,
            key: "lr-Adam".to_string(),
            history: Vec::new(),
        }
    }

    /// Log under `lr-{name}` of the optimizer being observed
    pub fn with_optimizer<O: Optimizer + ?Sized>(self, optimizer: &O) -> Self {
        self.with_key(format!("lr-{}", optimizer.name()))
    }

    /// Name under which records are logged
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn interval(&self) -> LoggingInterval {
        self.interval
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn history(&self) -> &[LrRecord] {
        &self.history
    }

    pub fn latest(&self) -> Option<f32> {
        self.history.last().map(|r| r.lr)
    }

    fn record(&mut self, index: usize, lr: f32) {
        log::info!("{} {index}: {} = {lr:.6e}", self.interval, self.key);
        self.history.push(LrRecord { index, lr });
    }
}

impl Default for LearningRateMonitor {
    fn default() -> Self {
        Self::new(LoggingInterval::Epoch)
    }
}

impl TrainerCallback for LearningRateMonitor {
    fn on_epoch_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        if self.interval == LoggingInterval::Epoch {
            self.record(ctx.epoch, ctx.lr);
        }
        CallbackAction::Continue
    }

    fn on_step_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        if self.interval == LoggingInterval::Step {
            self.record(ctx.global_step, ctx.lr);
        }
        CallbackAction::Continue
    }

    fn name(&self) -> &str {
        "LearningRateMonitor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(epoch: usize, global_step: usize, lr: f32) -> CallbackContext {
        CallbackContext {
            epoch,
            global_step,
            lr,
            ..Default::default()
        }
    }

    #[test]
    fn test_epoch_interval_records_once_per_epoch() {
        let mut monitor = LearningRateMonitor::new(LoggingInterval::Epoch);

        for epoch in 0..3 {
            let lr = 0.1 / (epoch + 1) as f32;
            monitor.on_epoch_begin(&ctx(epoch, epoch * 5, lr));
            for step in 0..5 {
                monitor.on_step_begin(&ctx(epoch, epoch * 5 + step, lr));
            }
        }

        assert_eq!(monitor.history().len(), 3);
        assert_eq!(monitor.history()[2], LrRecord { index: 2, lr: 0.1 / 3.0 });
        assert_eq!(monitor.latest(), Some(0.1 / 3.0));
    }

    #[test]
    fn test_step_interval_records_every_step() {
        let mut monitor = LearningRateMonitor::new(LoggingInterval::Step).with_key("lr");

        monitor.on_epoch_begin(&ctx(0, 0, 0.01));
        for step in 0..4 {
            monitor.on_step_begin(&ctx(0, step, 0.01));
        }

        assert_eq!(monitor.key(), "lr");
        assert_eq!(monitor.history().len(), 4);
        assert_eq!(monitor.history()[3].index, 3);
    }

    struct Sgd;

    impl Optimizer for Sgd {
        fn step(&mut self, _params: &mut [crate::Tensor]) -> crate::Result<()> {
            Ok(())
        }

        fn lr(&self) -> f32 {
            0.1
        }

        fn set_lr(&mut self, _lr: f32) {}

        fn name(&self) -> &str {
            "SGD"
        }
    }

    #[test]
    fn test_key_follows_optimizer_name() {
        let monitor = LearningRateMonitor::new(LoggingInterval::Epoch).with_optimizer(&Sgd);
        assert_eq!(monitor.key(), "lr-SGD");

        let boxed: Box<dyn Optimizer> = Box::new(Sgd);
        let monitor = LearningRateMonitor::default().with_optimizer(boxed.as_ref());
        assert_eq!(monitor.key(), "lr-SGD");
    }

    #[test]
    fn test_defaults() {
        let monitor = LearningRateMonitor::default();
        assert_eq!(monitor.interval(), LoggingInterval::Epoch);
        assert_eq!(monitor.key(), "lr-Adam");
        assert!(monitor.latest().is_none());
        assert_eq!(monitor.name(), "LearningRateMonitor");
    }
}
