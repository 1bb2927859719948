//! # Preparar: Training Setup Factory
//!
//! Preparar turns a small run configuration into the artifacts a training
//! engine consumes: a cross entropy loss, an Adam optimizer bound to the
//! model's parameters, a cosine annealing schedule and a pair of callbacks
//! (top-k checkpointing and learning rate logging).
//!
//! ## Architecture
//!
//! - **config**: YAML run configuration, validation and CLI overrides
//! - **factory**: Builders mapping a config to each artifact
//! - **optim**: Adam and cosine annealing
//! - **train**: Loss, callback dispatch, checkpointing, LR monitoring
//! - **model**: Parameter ownership seen by the optimizer

pub mod config;
pub mod error;
pub mod factory;
pub mod model;
pub mod optim;
pub mod tensor;
pub mod train;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{Error, Result};
pub use factory::{
    build_callbacks, build_checkpoint_callback, build_criterion, build_optimizer,
    build_scheduler, run_version, DefaultFactory, TrainingCallbacks, TrainingSetup,
};
pub use model::{Model, ParameterStore};
pub use tensor::Tensor;
