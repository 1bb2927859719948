//! Preparar CLI
//!
//! Resolves the training artifacts for a run configuration.
//!
//! # Usage
//!
//! ```bash
//! # Validate config
//! preparar validate run.yaml
//!
//! # Show the resolved setup
//! preparar plan run.yaml --monitor val_loss
//!
//! # Plan a tuning trial as JSON
//! preparar plan run.yaml --tune-version trial7 --format json
//! ```

use clap::Parser;
use preparar::config::{
    apply_overrides, load_config, validate_config, Cli, Command, OutputFormat, OverrideArgs,
    PlanArgs, RunConfig, ValidateArgs,
};
use preparar::factory::{checkpoint_dir, run_version, DefaultFactory, TrainingSetup};
use preparar::optim::Optimizer;
use preparar::train::{LoggingInterval, Mode, Monitor};
use preparar::{ParameterStore, Tensor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.filter()),
    )
    .init();

    let result = match cli.command {
        Command::Validate(args) => run_validate(args, log_level),
        Command::Plan(args) => run_plan(args, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    /// Default `RUST_LOG` filter when the variable is unset
    fn filter(self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "warn",
            LogLevel::Verbose => "debug",
        }
    }
}

fn say(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

fn load(config: &Path, overrides: &OverrideArgs) -> Result<RunConfig, String> {
    let mut cfg = load_config(config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut cfg, overrides);
    validate_config(&cfg).map_err(|e| format!("Validation failed: {e}"))?;
    Ok(cfg)
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    say(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let cfg = load(&args.config, &args.overrides)?;

    say(level, LogLevel::Normal, "Configuration is valid");
    say(
        level,
        LogLevel::Verbose,
        &format!("  Task: {} (version {})", cfg.task, run_version(&cfg)),
    );
    say(
        level,
        LogLevel::Verbose,
        &format!("  Checkpoints: {}", checkpoint_dir(&cfg).display()),
    );
    Ok(())
}

#[derive(Serialize)]
struct Plan {
    task: String,
    version: String,
    criterion: CriterionPlan,
    optimizer: OptimizerPlan,
    scheduler: SchedulerPlan,
    checkpoint: Option<CheckpointPlan>,
    lr_monitor: LrMonitorPlan,
}

#[derive(Serialize)]
struct CriterionPlan {
    name: &'static str,
    reduction: String,
}

#[derive(Serialize)]
struct OptimizerPlan {
    name: String,
    lr: f32,
    weight_decay: f32,
    betas: (f32, f32),
    eps: f32,
}

#[derive(Serialize)]
struct SchedulerPlan {
    name: &'static str,
    t_max: usize,
    eta_min: f32,
    lr_per_epoch: Vec<f32>,
}

#[derive(Serialize)]
struct CheckpointPlan {
    monitor: String,
    mode: Mode,
    save_top_k: usize,
    dirpath: PathBuf,
    filename: String,
}

#[derive(Serialize)]
struct LrMonitorPlan {
    interval: LoggingInterval,
    key: String,
}

fn build_plan(cfg: &RunConfig, monitor: &Monitor) -> Result<Plan, String> {
    // The CLI has no model; a single trainable scalar stands in for one
    let probe = ParameterStore::new().with_parameter("probe", Tensor::zeros(1, true));
    let setup = TrainingSetup::build(&DefaultFactory, &probe, monitor, cfg)
        .map_err(|e| format!("Setup error: {e}"))?;

    let optimizer = setup.scheduler.optimizer();
    let adam = optimizer.config();

    Ok(Plan {
        task: cfg.task.clone(),
        version: run_version(cfg),
        criterion: CriterionPlan {
            name: "CrossEntropyLoss",
            reduction: format!("{:?}", setup.criterion.reduction()).to_lowercase(),
        },
        optimizer: OptimizerPlan {
            name: optimizer.name().to_string(),
            lr: optimizer.lr(),
            weight_decay: adam.weight_decay,
            betas: adam.betas,
            eps: adam.eps,
        },
        scheduler: SchedulerPlan {
            name: "CosineAnnealingLR",
            t_max: setup.scheduler.t_max(),
            eta_min: setup.scheduler.eta_min(),
            lr_per_epoch: (0..cfg.epochs).map(|e| setup.scheduler.lr_at(e)).collect(),
        },
        checkpoint: setup.callbacks.checkpoint.as_ref().map(|cb| CheckpointPlan {
            monitor: cb.monitor().to_string(),
            mode: cb.mode(),
            save_top_k: cb.save_top_k(),
            dirpath: cb.dirpath().to_path_buf(),
            filename: cb.filename().to_string(),
        }),
        lr_monitor: LrMonitorPlan {
            interval: setup.callbacks.lr_monitor.interval(),
            key: setup.callbacks.lr_monitor.key().to_string(),
        },
    })
}

fn run_plan(args: PlanArgs, level: LogLevel) -> Result<(), String> {
    let cfg = load(&args.config, &args.overrides)?;
    let monitor = Monitor::parse(&args.monitor);
    let plan = build_plan(&cfg, &monitor)?;

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&plan)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Text => {
            say(
                level,
                LogLevel::Normal,
                &format!("Training setup for {} ({})", plan.task, plan.version),
            );
            println!();
            println!(
                "Criterion: {} (reduction={})",
                plan.criterion.name, plan.criterion.reduction
            );
            println!(
                "Optimizer: {} (lr={}, weight_decay={})",
                plan.optimizer.name, plan.optimizer.lr, plan.optimizer.weight_decay
            );
            println!(
                "Scheduler: {} (T_max={}, eta_min={})",
                plan.scheduler.name, plan.scheduler.t_max, plan.scheduler.eta_min
            );
            match &plan.checkpoint {
                Some(cb) => {
                    println!(
                        "Checkpoint: monitor={} mode={} top_k={}",
                        cb.monitor, cb.mode, cb.save_top_k
                    );
                    println!("  Directory: {}", cb.dirpath.display());
                    println!("  Filename: {}", cb.filename);
                }
                None => println!("Checkpoint: disabled (monitor {monitor})"),
            }
            println!(
                "LR monitor: {} (interval={})",
                plan.lr_monitor.key, plan.lr_monitor.interval
            );

            if level == LogLevel::Verbose {
                println!();
                println!("Learning rate per epoch:");
                for (epoch, lr) in plan.scheduler.lr_per_epoch.iter().enumerate() {
                    println!("  {epoch:>4}: {lr:.6e}");
                }
            }
        }
    }

    Ok(())
}
