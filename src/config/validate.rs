//! Configuration validation

use super::schema::RunConfig;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid weight decay: {0} (must be >= 0.0)")]
    InvalidWeightDecay(f32),

    #[error("Invalid EPOCHS: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Task must not be empty")]
    EmptyTask,

    #[error("VERSION must not be empty")]
    EmptyVersion,
}

/// Validate a run configuration
///
/// Checks the run invariants (`EPOCHS > 0`, `lr > 0`) and that the fields
/// forming the checkpoint directory are present.
pub fn validate_config(cfg: &RunConfig) -> Result<(), ValidationError> {
    if cfg.lr.is_nan() || cfg.lr <= 0.0 {
        return Err(ValidationError::InvalidLearningRate(cfg.lr));
    }

    if cfg.weight_decay.is_nan() || cfg.weight_decay < 0.0 {
        return Err(ValidationError::InvalidWeightDecay(cfg.weight_decay));
    }

    if cfg.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(cfg.epochs));
    }

    if cfg.task.trim().is_empty() {
        return Err(ValidationError::EmptyTask);
    }

    if cfg.version.trim().is_empty() {
        return Err(ValidationError::EmptyVersion);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> RunConfig {
        RunConfig::new("cifar10", "v1")
            .with_lr(0.001)
            .with_weight_decay(1e-4)
            .with_epochs(20)
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&create_valid_config()).is_ok());
    }

    #[test]
    fn test_invalid_learning_rate() {
        let cfg = create_valid_config().with_lr(0.0);
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidLearningRate(_)));

        let cfg = create_valid_config().with_lr(-0.1);
        assert!(validate_config(&cfg).is_err());

        let cfg = create_valid_config().with_lr(f32::NAN);
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_invalid_weight_decay() {
        let cfg = create_valid_config().with_weight_decay(-0.01);
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidWeightDecay(_)));
    }

    #[test]
    fn test_zero_weight_decay_allowed() {
        let cfg = create_valid_config().with_weight_decay(0.0);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_invalid_epochs() {
        let cfg = create_valid_config().with_epochs(0);
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidEpochs(0)));
    }

    #[test]
    fn test_empty_identifiers() {
        let mut cfg = create_valid_config();
        cfg.task = "  ".to_string();
        assert!(matches!(
            validate_config(&cfg).unwrap_err(),
            ValidationError::EmptyTask
        ));

        let mut cfg = create_valid_config();
        cfg.version = String::new();
        assert!(matches!(
            validate_config(&cfg).unwrap_err(),
            ValidationError::EmptyVersion
        ));
    }
}
