//! Metric-driven checkpointing
//!
//! [`ModelCheckpoint`] keeps the best `save_top_k` checkpoints ranked by a
//! monitored validation metric. Files are named from a template such as
//! `{epoch:02d}-{val_acc:.3f}`, which renders to `epoch=03-val_acc=0.912.ckpt`.

use super::callback::{CallbackAction, CallbackContext, TrainerCallback};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File extension of written checkpoints
pub const CHECKPOINT_EXT: &str = "ckpt";

/// Metric a checkpoint policy watches
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Monitor {
    /// Validation accuracy (`val_acc`)
    Accuracy,
    /// Validation loss (`val_loss`)
    Loss,
    /// Any other metric name
    Other(String),
}

impl Monitor {
    pub fn parse(name: &str) -> Self {
        match name {
            "val_acc" => Monitor::Accuracy,
            "val_loss" => Monitor::Loss,
            other => Monitor::Other(other.to_string()),
        }
    }

    /// Metric key as logged by the training engine
    pub fn as_str(&self) -> &str {
        match self {
            Monitor::Accuracy => "val_acc",
            Monitor::Loss => "val_loss",
            Monitor::Other(name) => name,
        }
    }
}

impl FromStr for Monitor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Monitor::parse(s))
    }
}

impl From<&str> for Monitor {
    fn from(s: &str) -> Self {
        Monitor::parse(s)
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranking direction for the monitored metric
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Lower is better
    Min,
    /// Higher is better
    Max,
}

impl Mode {
    /// Whether `current` ranks strictly ahead of `other`
    pub fn is_better(self, current: f32, other: f32) -> bool {
        match self {
            Mode::Min => current < other,
            Mode::Max => current > other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Min => "min",
            Mode::Max => "max",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk checkpoint document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub global_step: usize,
    pub monitor: String,
    pub score: f32,
    pub lr: f32,
    pub metrics: BTreeMap<String, f32>,
    pub weights: Vec<Vec<f32>>,
}

impl Checkpoint {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Save the top-k checkpoints ranked by a monitored metric
#[derive(Clone, Debug)]
pub struct ModelCheckpoint {
    monitor: Monitor,
    dirpath: PathBuf,
    filename: String,
    save_top_k: usize,
    mode: Mode,
    auto_insert_metric_name: bool,
    /// Kept checkpoints with their scores, in save order
    best_k_models: Vec<(PathBuf, f32)>,
    best_model_path: Option<PathBuf>,
    best_model_score: Option<f32>,
    last_saved: Option<PathBuf>,
}

impl ModelCheckpoint {
    /// Keep the single best checkpoint by minimum `monitor`, named `{epoch}-{step}`
    pub fn new(monitor: Monitor, dirpath: impl Into<PathBuf>) -> Self {
        Self {
            monitor,
            dirpath: dirpath.into(),
            filename: "{epoch}-{step}".to_string(),
            save_top_k: 1,
            mode: Mode::Min,
            auto_insert_metric_name: true,
            best_k_models: Vec::new(),
            best_model_path: None,
            best_model_score: None,
            last_saved: None,
        }
    }

    /// File name template without extension
    ///
    /// `{name}` or `{name:spec}` groups are replaced with `epoch`, `step` or a
    /// logged metric. Supported specs: `0Nd`/`Nd` for integers and `.Nf` for
    /// fixed decimals.
    pub fn with_filename(mut self, template: impl Into<String>) -> Self {
        self.filename = template.into();
        self
    }

    pub fn with_save_top_k(mut self, k: usize) -> Self {
        self.save_top_k = k;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Render groups as `name=value` (default) or bare `value`
    pub fn with_auto_insert_metric_name(mut self, enabled: bool) -> Self {
        self.auto_insert_metric_name = enabled;
        self
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn dirpath(&self) -> &Path {
        &self.dirpath
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn save_top_k(&self) -> usize {
        self.save_top_k
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn best_model_path(&self) -> Option<&Path> {
        self.best_model_path.as_deref()
    }

    pub fn best_model_score(&self) -> Option<f32> {
        self.best_model_score
    }

    pub fn last_saved(&self) -> Option<&Path> {
        self.last_saved.as_deref()
    }

    /// Kept checkpoints and their scores, in save order
    pub fn best_k_models(&self) -> &[(PathBuf, f32)] {
        &self.best_k_models
    }

    /// Worst of the kept checkpoints, the next one to be evicted
    pub fn kth_best_model_path(&self) -> Option<&Path> {
        self.worst_index().map(|i| self.best_k_models[i].0.as_path())
    }

    fn worst_index(&self) -> Option<usize> {
        let mut worst: Option<usize> = None;
        for (i, (_, score)) in self.best_k_models.iter().enumerate() {
            match worst {
                Some(w) if !self.mode.is_better(self.best_k_models[w].1, *score) => {}
                _ => worst = Some(i),
            }
        }
        worst
    }

    fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, (_, score)) in self.best_k_models.iter().enumerate() {
            match best {
                Some(b) if !self.mode.is_better(*score, self.best_k_models[b].1) => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Whether a checkpoint scoring `current` would be kept
    pub fn should_save(&self, current: f32) -> bool {
        if self.save_top_k == 0 || current.is_nan() {
            return false;
        }
        if self.best_k_models.len() < self.save_top_k {
            return true;
        }
        self.worst_index()
            .is_some_and(|w| self.mode.is_better(current, self.best_k_models[w].1))
    }

    fn checkpoint_stem(&self, ctx: &CallbackContext) -> String {
        render_filename(
            &self.filename,
            ctx.epoch,
            ctx.global_step,
            &ctx.metrics,
            self.auto_insert_metric_name,
        )
    }

    /// File name (with extension) for the state in `ctx`
    pub fn format_checkpoint_name(&self, ctx: &CallbackContext) -> String {
        format!("{}.{CHECKPOINT_EXT}", self.checkpoint_stem(ctx))
    }

    /// Full checkpoint path for `ctx`, with a `-vN` suffix if the name is taken
    ///
    /// A name is taken when a kept checkpoint or a file on disk already uses
    /// it. The checkpoint about to be evicted does not count, so its name can
    /// be reused.
    fn checkpoint_path(&self, ctx: &CallbackContext, evicting: Option<&Path>) -> PathBuf {
        let stem = self.checkpoint_stem(ctx);
        let taken = |path: &Path| {
            evicting != Some(path)
                && (self.best_k_models.iter().any(|(p, _)| p == path) || path.exists())
        };

        let mut path = self.dirpath.join(format!("{stem}.{CHECKPOINT_EXT}"));
        let mut version = 1;
        while taken(&path) {
            path = self
                .dirpath
                .join(format!("{stem}-v{version}.{CHECKPOINT_EXT}"));
            version += 1;
        }
        path
    }

    /// Rank the monitored metric in `ctx` and save a checkpoint if it makes the top k
    ///
    /// Returns the written path, or `None` when nothing was saved. A missing
    /// metric is not an error.
    pub fn update(&mut self, ctx: &CallbackContext) -> Result<Option<PathBuf>> {
        let Some(current) = ctx.metric(self.monitor.as_str()) else {
            log::warn!(
                "ModelCheckpoint(monitor={}) could not find the monitored key in the logged metrics",
                self.monitor
            );
            return Ok(None);
        };

        if !self.should_save(current) {
            log::debug!(
                "epoch {}: {} = {current:.3} was not in top {}",
                ctx.epoch,
                self.monitor,
                self.save_top_k
            );
            return Ok(None);
        }

        let evict = if self.best_k_models.len() >= self.save_top_k {
            self.worst_index()
        } else {
            None
        };
        let evicted_path = evict.map(|w| self.best_k_models[w].0.clone());
        let path = self.checkpoint_path(ctx, evicted_path.as_deref());

        let checkpoint = Checkpoint {
            epoch: ctx.epoch,
            global_step: ctx.global_step,
            monitor: self.monitor.as_str().to_string(),
            score: current,
            lr: ctx.lr,
            metrics: ctx.metrics.clone(),
            weights: ctx.weights.clone(),
        };
        // Kept set and files stay untouched until the new checkpoint is on disk
        checkpoint.save(&path)?;

        if let Some(w) = evict {
            let (evicted, _) = self.best_k_models.remove(w);
            if evicted != path {
                if let Err(e) = remove_checkpoint(&evicted) {
                    log::warn!("could not remove evicted checkpoint {}: {e}", evicted.display());
                }
            }
        }

        log::info!(
            "epoch {}: {} reached {current:.3} (top {}), saved {}",
            ctx.epoch,
            self.monitor,
            self.save_top_k,
            path.display()
        );

        self.best_k_models.push((path.clone(), current));
        if let Some(b) = self.best_index() {
            let (best_path, best_score) = &self.best_k_models[b];
            self.best_model_path = Some(best_path.clone());
            self.best_model_score = Some(*best_score);
        }
        self.last_saved = Some(path.clone());

        Ok(Some(path))
    }
}

impl TrainerCallback for ModelCheckpoint {
    fn on_validation_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        match self.update(ctx) {
            Ok(_) => CallbackAction::Continue,
            Err(e) => {
                log::error!("checkpoint save failed: {e}");
                CallbackAction::Stop
            }
        }
    }

    fn name(&self) -> &str {
        "ModelCheckpoint"
    }
}

fn remove_checkpoint(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed checkpoint {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Render a `{name:spec}` template
fn render_filename(
    template: &str,
    epoch: usize,
    step: usize,
    metrics: &BTreeMap<String, f32>,
    auto_insert_metric_name: bool,
) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        out.push_str(&rest[..open]);

        let group = &rest[open + 1..close];
        let (name, spec) = group.split_once(':').unwrap_or((group, ""));
        let rendered = match name {
            "epoch" => format_integer(epoch as i64, spec),
            "step" => format_integer(step as i64, spec),
            metric => format_float(metrics.get(metric).copied().unwrap_or(0.0), spec),
        };
        if auto_insert_metric_name {
            out.push_str(name);
            out.push('=');
        }
        out.push_str(&rendered);

        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn format_integer(value: i64, spec: &str) -> String {
    match spec.strip_suffix('d') {
        Some(width) => {
            let zero_pad = width.starts_with('0');
            let width: usize = width.trim_start_matches('0').parse().unwrap_or(0);
            if zero_pad {
                format!("{value:0width$}")
            } else {
                format!("{value:width$}")
            }
        }
        None if spec.is_empty() => value.to_string(),
        None => format_float(value as f32, spec),
    }
}

fn format_float(value: f32, spec: &str) -> String {
    if let Some(precision) = spec.strip_prefix('.').and_then(|s| s.strip_suffix('f')) {
        if let Ok(precision) = precision.parse::<usize>() {
            return format!("{value:.precision$}");
        }
    }
    if spec.ends_with('d') {
        return format_integer(value.round() as i64, spec);
    }
    value.to_string()
}
