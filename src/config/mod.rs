//! Run configuration
//!
//! A run is described by a small YAML file:
//!
//! ```yaml
//! lr: 0.001
//! weight_decay: 0.0001
//! EPOCHS: 50
//! CKPT_PATH: ./checkpoints
//! task: cifar10
//! VERSION: resnet18
//! TUNE_VERSION: trial7   # optional
//! ```

mod cli;
mod load;
mod schema;
mod validate;



pub use cli::{
    apply_overrides, parse_args, Cli, Command, OutputFormat, OverrideArgs, PlanArgs, ValidateArgs,
};
pub use load::{load_config, parse_config};
pub use schema::RunConfig;
pub use validate::{validate_config, ValidationError};
