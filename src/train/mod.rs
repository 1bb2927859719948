//! Training artifacts handed to a training engine
//!
//! This module provides:
//! - Loss functions (Cross-Entropy)
//! - Callback system and dispatch
//! - Top-k checkpointing on a monitored metric
//! - Learning rate logging
//!
//! # Example
//!
//! ```no_run
//! use preparar::train::{CallbackManager, LearningRateMonitor, LoggingInterval};
//!
//! let mut callbacks = CallbackManager::new();
//! callbacks.add(LearningRateMonitor::new(LoggingInterval::Epoch));
//!
//! // Inside the engine's loop
//! // for epoch in 0..epochs {
//! //     callbacks.on_epoch_begin(&ctx);
//! //     ...
//! //     callbacks.on_validation_end(&ctx);
//! // }
//! ```

pub mod callback;
pub mod checkpoint;
mod loss;
mod lr_monitor;

pub use callback::{CallbackAction, CallbackContext, CallbackManager, TrainerCallback};
pub use checkpoint::{Checkpoint, Mode, ModelCheckpoint, Monitor, CHECKPOINT_EXT};
pub use loss::{CrossEntropyLoss, LossFn, LossOutput, Reduction};
pub use lr_monitor::{LearningRateMonitor, LoggingInterval, LrRecord};
