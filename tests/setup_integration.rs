//! Integration tests for training setup.
//!
//! Loads a run configuration from disk, builds every artifact and drives a
//! short simulated run through them.

use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use preparar::config::{load_config, validate_config, RunConfig};
use preparar::factory::{build_callbacks, build_criterion, build_optimizer, build_scheduler};
use preparar::optim::{LRScheduler, Optimizer};
use preparar::train::{
    CallbackAction, CallbackContext, Checkpoint, LossFn, Monitor, TrainerCallback,
};
use preparar::{DefaultFactory, Error, Model, ParameterStore, Tensor, TrainingSetup};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TARGETS: [usize; 2] = [0, 1];

fn write_config(dir: &Path, tune_version: Option<&str>) -> RunConfig {
    let mut yaml = format!(
        "lr: 0.01\nweight_decay: 0.0005\nEPOCHS: 5\nCKPT_PATH: {}\ntask: mnist\nVERSION: v1\n",
        dir.join("ckpt").display()
    );
    if let Some(trial) = tune_version {
        yaml.push_str(&format!("TUNE_VERSION: {trial}\n"));
    }
    let path = dir.join("run.yaml");
    fs::write(&path, yaml).unwrap();

    let cfg = load_config(&path).unwrap();
    validate_config(&cfg).unwrap();
    cfg
}

fn model() -> ParameterStore {
    ParameterStore::new()
        .with_parameter("w", Tensor::from_vec(vec![0.5, -0.5, 1.0, 0.0], true))
        .with_parameter("b", Tensor::zeros(2, true))
}

/// Treat `w` as a 2x2 logit matrix, backprop the loss into it and return the loss
fn forward_backward(model: &mut ParameterStore, criterion: &dyn LossFn) -> f32 {
    let w = model.get("w").unwrap().data().to_vec();
    let logits = Array2::from_shape_vec((2, 2), w).unwrap();
    let out = criterion.forward(&logits, &TARGETS).unwrap();

    let grad = Array1::from_iter(out.grad.iter().copied());
    model.parameters_mut()[0].set_grad(grad).unwrap();
    out.loss.unwrap()
}

fn checkpoint_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_simulated_run_keeps_top3_accuracy_checkpoints() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(dir.path(), Some("trial7"));
    let mut model = model();

    let criterion = build_criterion();
    let optimizer = build_optimizer(&model, &cfg).unwrap();
    let mut scheduler = build_scheduler(optimizer, &cfg).unwrap();
    let mut callbacks = build_callbacks(&Monitor::Accuracy, &cfg).into_manager();

    let accuracies = [0.5, 0.7, 0.6, 0.9, 0.8];
    let mut losses = Vec::new();

    for (epoch, &acc) in accuracies.iter().enumerate() {
        let mut ctx = CallbackContext {
            epoch,
            max_epochs: cfg.epochs,
            global_step: epoch,
            lr: scheduler.optimizer().lr(),
            ..Default::default()
        };
        assert_eq!(callbacks.on_epoch_begin(&ctx), CallbackAction::Continue);

        losses.push(forward_backward(&mut model, &criterion));
        scheduler
            .optimizer_mut()
            .step(model.parameters_mut())
            .unwrap();

        ctx = ctx.with_metric("val_acc", acc);
        ctx.weights = model.snapshot();
        assert_eq!(callbacks.on_validation_end(&ctx), CallbackAction::Continue);

        scheduler.step();
    }

    assert!(losses.last().unwrap() < losses.first().unwrap());

    let run_dir = dir.path().join("ckpt").join("mnist").join("v1-trial7");
    assert_eq!(
        checkpoint_names(&run_dir),
        vec![
            "epoch=01-val_acc=0.700.ckpt",
            "epoch=03-val_acc=0.900.ckpt",
            "epoch=04-val_acc=0.800.ckpt",
        ]
    );

    let best = Checkpoint::load(run_dir.join("epoch=03-val_acc=0.900.ckpt")).unwrap();
    assert_eq!(best.epoch, 3);
    assert_eq!(best.monitor, "val_acc");
    assert_relative_eq!(best.score, 0.9);
    assert_eq!(best.weights.len(), 2);
    assert_eq!(best.weights[0].len(), 4);
}

#[test]
fn test_simulated_run_records_lr_and_best_loss() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(dir.path(), None);
    let model = model();

    let optimizer = build_optimizer(&model, &cfg).unwrap();
    let mut scheduler = build_scheduler(optimizer, &cfg).unwrap();
    let mut callbacks = build_callbacks(&Monitor::Loss, &cfg);

    let val_losses = [1.2, 0.9, 1.0, 0.7, 0.8];
    for (epoch, &loss) in val_losses.iter().enumerate() {
        let ctx = CallbackContext {
            epoch,
            lr: scheduler.optimizer().lr(),
            ..Default::default()
        }
        .with_metric("val_loss", loss);

        let slots: [Option<&mut dyn TrainerCallback>; 2] = [
            callbacks.checkpoint.as_mut().map(|cb| cb as &mut dyn TrainerCallback),
            Some(&mut callbacks.lr_monitor),
        ];
        for callback in slots.into_iter().flatten() {
            callback.on_epoch_begin(&ctx);
            callback.on_validation_end(&ctx);
        }
        scheduler.step();
    }

    let history = callbacks.lr_monitor.history();
    assert_eq!(history.len(), 5);
    assert_relative_eq!(history[0].lr, 0.01);
    for pair in history.windows(2) {
        assert!(pair[1].lr < pair[0].lr);
    }
    assert_relative_eq!(history[4].lr, scheduler.lr_at(4), epsilon = 1e-7);

    let checkpoint = callbacks.checkpoint.as_ref().unwrap();
    assert_eq!(checkpoint.best_model_score(), Some(0.7));
    assert_eq!(checkpoint.best_k_models().len(), 3);

    let run_dir = dir.path().join("ckpt").join("mnist").join("v1");
    assert_eq!(
        checkpoint_names(&run_dir),
        vec![
            "epoch=01-val_loss=0.900.ckpt",
            "epoch=03-val_loss=0.700.ckpt",
            "epoch=04-val_loss=0.800.ckpt",
        ]
    );
}

#[test]
fn test_unmonitored_metric_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(dir.path(), None);

    let callbacks = build_callbacks(&Monitor::parse("train_loss"), &cfg);
    assert!(callbacks.checkpoint.is_none());

    let mut manager = callbacks.into_manager();
    assert_eq!(manager.names(), vec!["LearningRateMonitor"]);

    let ctx = CallbackContext::default().with_metric("train_loss", 0.3);
    manager.on_epoch_begin(&ctx);
    assert_eq!(manager.on_validation_end(&ctx), CallbackAction::Continue);

    assert!(!dir.path().join("ckpt").exists());
}

#[test]
fn test_setup_through_default_factory() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(dir.path(), Some("trial2"));
    let model = model();

    let setup = TrainingSetup::build(&DefaultFactory, &model, &Monitor::Accuracy, &cfg).unwrap();
    assert_eq!(setup.scheduler.last_epoch(), 0);
    assert_relative_eq!(setup.scheduler.optimizer().lr(), 0.01);

    let checkpoint = setup.callbacks.checkpoint.unwrap();
    assert!(checkpoint.dirpath().ends_with("mnist/v1-trial2"));

    let empty = ParameterStore::new();
    let result = TrainingSetup::build(&DefaultFactory, &empty, &Monitor::Accuracy, &cfg);
    assert!(matches!(result, Err(Error::EmptyParameters)));
}
