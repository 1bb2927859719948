//! YAML schema for a run configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for one training run
///
/// Keys follow the run-config files: `lr`, `weight_decay`, `task` in lower
/// case; `EPOCHS`, `CKPT_PATH`, `VERSION`, `TUNE_VERSION` in upper case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Learning rate
    pub lr: f32,

    /// L2 weight decay
    #[serde(default)]
    pub weight_decay: f32,

    /// Total training epochs
    #[serde(rename = "EPOCHS")]
    pub epochs: usize,

    /// Root directory for checkpoints
    #[serde(rename = "CKPT_PATH", default = "default_ckpt_path")]
    pub ckpt_path: PathBuf,

    /// Task identifier, first directory level under `CKPT_PATH`
    pub task: String,

    /// Run version, second directory level under `CKPT_PATH`
    #[serde(rename = "VERSION")]
    pub version: String,

    /// Hyperparameter-tuning trial, appended to the version when set
    #[serde(
        rename = "TUNE_VERSION",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tune_version: Option<String>,
}

impl RunConfig {
    /// Config with default hyperparameters for `task` at `version`
    pub fn new(task: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            lr: 1e-3,
            weight_decay: 0.0,
            epochs: default_epochs(),
            ckpt_path: default_ckpt_path(),
            task: task.into(),
            version: version.into(),
            tune_version: None,
        }
    }

    pub fn with_lr(mut self, lr: f32) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_ckpt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ckpt_path = path.into();
        self
    }

    pub fn with_tune_version(mut self, tune_version: impl Into<String>) -> Self {
        self.tune_version = Some(tune_version.into());
        self
    }

    /// Tuning trial name, if set and non-empty
    pub fn tune_version(&self) -> Option<&str> {
        self.tune_version.as_deref().filter(|v| !v.is_empty())
    }
}

fn default_epochs() -> usize {
    10
}

fn default_ckpt_path() -> PathBuf {
    PathBuf::from("./checkpoints")
}
