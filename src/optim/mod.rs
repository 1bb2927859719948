//! Optimizers and learning rate schedulers

mod adam;
mod optimizer;
mod scheduler;

pub use adam::{Adam, AdamConfig};
pub use optimizer::Optimizer;
pub use scheduler::{CosineAnnealingLR, LRScheduler};
