//! Training setup factories
//!
//! Turns a [`RunConfig`] into the four artifacts a training engine consumes:
//! loss, optimizer, learning rate schedule and callbacks. Each builder only
//! forwards config values; invalid values surface as errors from the
//! artifact constructors themselves.
//!
//! # Example
//!
//! ```
//! use preparar::config::RunConfig;
//! use preparar::factory::{build_callbacks, build_criterion, build_optimizer, build_scheduler};
//! use preparar::model::ParameterStore;
//! use preparar::train::Monitor;
//! use preparar::Tensor;
//!
//! let cfg = RunConfig::new("cifar10", "v1").with_lr(0.01).with_epochs(30);
//! let model = ParameterStore::new().with_parameter("w", Tensor::zeros(8, true));
//!
//! let criterion = build_criterion();
//! let optimizer = build_optimizer(&model, &cfg)?;
//! let scheduler = build_scheduler(optimizer, &cfg)?;
//! let callbacks = build_callbacks(&Monitor::Accuracy, &cfg);
//!
//! assert_eq!(scheduler.t_max(), 30);
//! assert!(callbacks.checkpoint.is_some());
//! # Ok::<(), preparar::Error>(())
//! ```

use crate::config::RunConfig;
use crate::model::Model;
use crate::optim::{Adam, AdamConfig, CosineAnnealingLR, LRScheduler, Optimizer};
use crate::train::{
    CallbackManager, CrossEntropyLoss, LearningRateMonitor, LoggingInterval, LossFn, Mode,
    ModelCheckpoint, Monitor, TrainerCallback,
};
use crate::Result;
use std::path::PathBuf;

/// Checkpoints retained per run
pub const SAVE_TOP_K: usize = 3;

/// Floor of the cosine schedule
pub const ETA_MIN: f32 = 0.0;

/// Version segment of the checkpoint directory
///
/// `VERSION` alone, or `VERSION-TUNE_VERSION` when a non-empty tuning trial
/// is set on the config.
pub fn run_version(cfg: &RunConfig) -> String {
    match cfg.tune_version() {
        Some(trial) => format!("{}-{}", cfg.version, trial),
        None => cfg.version.clone(),
    }
}

/// `{CKPT_PATH}/{task}/{version}`
pub fn checkpoint_dir(cfg: &RunConfig) -> PathBuf {
    cfg.ckpt_path.join(&cfg.task).join(run_version(cfg))
}

/// Multi-class cross entropy, unweighted, mean reduction
pub fn build_criterion() -> CrossEntropyLoss {
    CrossEntropyLoss::new()
}

/// Adam over the model's trainable parameters with `lr` and `weight_decay` from `cfg`
pub fn build_optimizer<M: Model + ?Sized>(model: &M, cfg: &RunConfig) -> Result<Adam> {
    let config = AdamConfig::new(cfg.lr).with_weight_decay(cfg.weight_decay);
    let optimizer = Adam::new(model.parameters(), config)?;
    log::debug!(
        "optimizer: Adam(lr={}, weight_decay={}) over {} parameters",
        cfg.lr,
        cfg.weight_decay,
        optimizer.num_parameters()
    );
    Ok(optimizer)
}

/// Cosine annealing over `EPOCHS` epochs down to zero, wrapping `optimizer`
pub fn build_scheduler<O: Optimizer>(optimizer: O, cfg: &RunConfig) -> Result<CosineAnnealingLR<O>> {
    let scheduler = CosineAnnealingLR::new(optimizer, cfg.epochs, ETA_MIN)?;
    log::debug!(
        "scheduler: CosineAnnealingLR(T_max={}, eta_min={ETA_MIN})",
        cfg.epochs
    );
    Ok(scheduler)
}

/// Checkpoint policy for `monitor`, or `None` for metrics without one
///
/// `val_acc` keeps the three highest, `val_loss` the three lowest. Files go to
/// [`checkpoint_dir`] and are named after the zero-padded epoch and the metric
/// to three decimals.
pub fn build_checkpoint_callback(monitor: &Monitor, cfg: &RunConfig) -> Option<ModelCheckpoint> {
    let mode = match monitor {
        Monitor::Accuracy => Mode::Max,
        Monitor::Loss => Mode::Min,
        Monitor::Other(name) => {
            log::debug!("no checkpoint policy for monitor {name}");
            return None;
        }
    };

    let dirpath = checkpoint_dir(cfg);
    log::debug!(
        "checkpoint policy: monitor={monitor}, mode={mode}, top_k={SAVE_TOP_K}, dir={}",
        dirpath.display()
    );

    Some(
        ModelCheckpoint::new(monitor.clone(), dirpath)
            .with_filename(format!("{{epoch:02d}}-{{{}:.3f}}", monitor.as_str()))
            .with_save_top_k(SAVE_TOP_K)
            .with_mode(mode),
    )
}

/// Callbacks for one run: the checkpoint policy (if any) then the LR monitor
pub fn build_callbacks(monitor: &Monitor, cfg: &RunConfig) -> TrainingCallbacks {
    TrainingCallbacks {
        checkpoint: build_checkpoint_callback(monitor, cfg),
        lr_monitor: LearningRateMonitor::new(LoggingInterval::Epoch),
    }
}

/// Ordered callback pair handed to the training engine
#[derive(Clone, Debug)]
pub struct TrainingCallbacks {
    pub checkpoint: Option<ModelCheckpoint>,
    pub lr_monitor: LearningRateMonitor,
}

impl TrainingCallbacks {
    /// Both slots in order; the checkpoint slot may be empty
    pub fn entries(&self) -> [Option<&dyn TrainerCallback>; 2] {
        [
            self.checkpoint.as_ref().map(|cb| cb as &dyn TrainerCallback),
            Some(&self.lr_monitor as &dyn TrainerCallback),
        ]
    }

    /// Name the LR monitor's log key after `optimizer`
    pub fn with_optimizer<O: Optimizer + ?Sized>(mut self, optimizer: &O) -> Self {
        self.lr_monitor = self.lr_monitor.with_optimizer(optimizer);
        self
    }

    /// Register the present callbacks, in order, with a new manager
    pub fn into_manager(self) -> CallbackManager {
        let mut manager = CallbackManager::new();
        if let Some(checkpoint) = self.checkpoint {
            manager.add(checkpoint);
        }
        manager.add(self.lr_monitor);
        manager
    }
}

// =============================================================================
// Capability traits
// =============================================================================

/// Builds the loss function
pub trait LossFactory {
    type Loss: LossFn;

    fn criterion(&self) -> Self::Loss;
}

/// Builds an optimizer bound to a model
pub trait OptimizerFactory {
    type Optimizer: Optimizer;

    fn optimizer(&self, model: &dyn Model, cfg: &RunConfig) -> Result<Self::Optimizer>;
}

/// Builds a schedule wrapping an optimizer
pub trait SchedulerFactory<O: Optimizer> {
    type Scheduler: LRScheduler;

    fn scheduler(&self, optimizer: O, cfg: &RunConfig) -> Result<Self::Scheduler>;
}

/// Builds the training callbacks
pub trait CallbackFactory {
    type Callbacks;

    fn callbacks(&self, monitor: &Monitor, cfg: &RunConfig) -> Self::Callbacks;

    /// Callbacks for a run driven by `optimizer`
    fn callbacks_for(
        &self,
        monitor: &Monitor,
        cfg: &RunConfig,
        _optimizer: &dyn Optimizer,
    ) -> Self::Callbacks {
        self.callbacks(monitor, cfg)
    }
}

/// Factory backed by this crate's artifacts
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFactory;

impl LossFactory for DefaultFactory {
    type Loss = CrossEntropyLoss;

    fn criterion(&self) -> Self::Loss {
        build_criterion()
    }
}

impl OptimizerFactory for DefaultFactory {
    type Optimizer = Adam;

    fn optimizer(&self, model: &dyn Model, cfg: &RunConfig) -> Result<Self::Optimizer> {
        build_optimizer(model, cfg)
    }
}

impl<O: Optimizer> SchedulerFactory<O> for DefaultFactory {
    type Scheduler = CosineAnnealingLR<O>;

    fn scheduler(&self, optimizer: O, cfg: &RunConfig) -> Result<Self::Scheduler> {
        build_scheduler(optimizer, cfg)
    }
}

impl CallbackFactory for DefaultFactory {
    type Callbacks = TrainingCallbacks;

    fn callbacks(&self, monitor: &Monitor, cfg: &RunConfig) -> Self::Callbacks {
        build_callbacks(monitor, cfg)
    }

    fn callbacks_for(
        &self,
        monitor: &Monitor,
        cfg: &RunConfig,
        optimizer: &dyn Optimizer,
    ) -> Self::Callbacks {
        build_callbacks(monitor, cfg).with_optimizer(optimizer)
    }
}

/// Everything a training engine needs for one run
pub struct TrainingSetup<F>
where
    F: LossFactory + OptimizerFactory + SchedulerFactory<<F as OptimizerFactory>::Optimizer> + CallbackFactory,
{
    pub criterion: <F as LossFactory>::Loss,
    pub scheduler: <F as SchedulerFactory<<F as OptimizerFactory>::Optimizer>>::Scheduler,
    pub callbacks: <F as CallbackFactory>::Callbacks,
}

impl<F> TrainingSetup<F>
where
    F: LossFactory + OptimizerFactory + SchedulerFactory<<F as OptimizerFactory>::Optimizer> + CallbackFactory,
{
    /// Build all artifacts; the optimizer is built first and moved into the scheduler
    pub fn build(factory: &F, model: &dyn Model, monitor: &Monitor, cfg: &RunConfig) -> Result<Self> {
        let criterion = factory.criterion();
        let optimizer = factory.optimizer(model, cfg)?;
        let callbacks = factory.callbacks_for(monitor, cfg, &optimizer);
        let scheduler = factory.scheduler(optimizer, cfg)?;
        Ok(Self {
            criterion,
            scheduler,
            callbacks,
        })
    }
}
