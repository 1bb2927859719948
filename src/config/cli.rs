//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! preparar validate run.yaml
//! preparar plan run.yaml --monitor val_loss
//! preparar plan run.yaml --tune-version trial7 --format json
//! ```

use super::schema::RunConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// preparar: build training artifacts from a run configuration
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "preparar")]
#[command(version)]
#[command(about = "Resolve loss, optimizer, LR schedule and callbacks for a training run")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a run configuration file
    Validate(ValidateArgs),

    /// Build every artifact for a run and print the resolved setup
    Plan(PlanArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Arguments for the plan command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct PlanArgs {
    /// Path to YAML run configuration
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Metric the checkpoint callback watches (val_acc, val_loss, ...)
    #[arg(short, long, default_value = "val_acc")]
    pub monitor: String,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Values replacing the ones read from the config file
#[derive(Args, Debug, Clone, PartialEq, Default)]
pub struct OverrideArgs {
    /// Override learning rate
    #[arg(long)]
    pub lr: Option<f32>,

    /// Override weight decay
    #[arg(long)]
    pub weight_decay: Option<f32>,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override checkpoint root directory
    #[arg(long)]
    pub ckpt_path: Option<PathBuf>,

    /// Set the tuning trial appended to the version
    #[arg(long)]
    pub tune_version: Option<String>,
}

/// Output format for the plan command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json",
                s
            )),
        }
    }
}

/// Parse command line arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a RunConfig
pub fn apply_overrides(cfg: &mut RunConfig, args: &OverrideArgs) {
    if let Some(lr) = args.lr {
        cfg.lr = lr;
    }
    if let Some(weight_decay) = args.weight_decay {
        cfg.weight_decay = weight_decay;
    }
    if let Some(epochs) = args.epochs {
        cfg.epochs = epochs;
    }
    if let Some(ckpt_path) = &args.ckpt_path {
        cfg.ckpt_path = ckpt_path.clone();
    }
    if let Some(tune_version) = &args.tune_version {
        cfg.tune_version = Some(tune_version.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_command() {
        let cli = parse_args(["preparar", "validate", "run.yaml"]).unwrap();
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("run.yaml"));
                assert_eq!(args.overrides, OverrideArgs::default());
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_parse_plan_defaults() {
        let cli = parse_args(["preparar", "plan", "run.yaml"]).unwrap();
        match cli.command {
            Command::Plan(args) => {
                assert_eq!(args.monitor, "val_acc");
                assert_eq!(args.format, OutputFormat::Text);
            }
            _ => panic!("Expected Plan command"),
        }
        assert!(!cli.verbose);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_plan_with_overrides() {
        let cli = parse_args([
            "preparar",
            "plan",
            "run.yaml",
            "--monitor",
            "val_loss",
            "--format",
            "json",
            "--epochs",
            "40",
            "--lr",
            "0.01",
            "--weight-decay",
            "0.001",
            "--tune-version",
            "trial7",
            "--ckpt-path",
            "/scratch/ckpt",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Command::Plan(args) => {
                assert_eq!(args.monitor, "val_loss");
                assert_eq!(args.format, OutputFormat::Json);
                assert_eq!(args.overrides.epochs, Some(40));
                assert!((args.overrides.lr.unwrap() - 0.01).abs() < 1e-6);
                assert_eq!(args.overrides.tune_version.as_deref(), Some("trial7"));
                assert_eq!(
                    args.overrides.ckpt_path,
                    Some(PathBuf::from("/scratch/ckpt"))
                );
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_parse_unknown_format_fails() {
        let result = parse_args(["preparar", "plan", "run.yaml", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_missing_config_fails() {
        assert!(parse_args(["preparar", "plan"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut cfg = RunConfig::new("cifar10", "v1");
        let args = OverrideArgs {
            lr: Some(0.05),
            weight_decay: Some(0.01),
            epochs: Some(3),
            ckpt_path: Some(PathBuf::from("/tmp/c")),
            tune_version: Some("trial2".to_string()),
        };

        apply_overrides(&mut cfg, &args);

        assert_eq!(cfg.lr, 0.05);
        assert_eq!(cfg.weight_decay, 0.01);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.ckpt_path, PathBuf::from("/tmp/c"));
        assert_eq!(cfg.tune_version(), Some("trial2"));
    }

    #[test]
    fn test_apply_empty_overrides_keeps_config() {
        let mut cfg = RunConfig::new("cifar10", "v1");
        let before = cfg.clone();
        apply_overrides(&mut cfg, &OverrideArgs::default());
        assert_eq!(cfg, before);
    }
}
