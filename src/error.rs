//! Error types for the diffusion engine.
//!
//! Every failure the engine can raise maps onto one [`ErrorCode`], so callers
//! can branch on the kind of failure without matching on message text.

use std::fmt;

/// Error codes attached to every [`DiffusionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Configuration is invalid.
    /// Trigger: unknown beta schedule or sampler name, bad step count, eta outside [0, 1].
    ConfigError,

    /// Tensor shapes or timestep values are incompatible.
    /// Trigger: timestep batch length differs from image batch, timestep outside [0, T).
    ShapeError,

    /// Non-finite or degenerate numbers were produced.
    /// Trigger: schedule coefficients not finite, alphas_cumprod not strictly decreasing.
    NumericError,

    /// The external noise predictor reported a failure.
    PredictorFailed,

    /// Reading or writing a file failed.
    IoError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::ShapeError => "SHAPE_ERROR",
            ErrorCode::NumericError => "NUMERIC_ERROR",
            ErrorCode::PredictorFailed => "PREDICTOR_FAILED",
            ErrorCode::IoError => "IO_ERROR",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::ConfigError => "Diffusion or sampler configuration is invalid",
            ErrorCode::ShapeError => "Tensor shape or timestep value is out of range",
            ErrorCode::NumericError => "Non-finite value produced by the schedule or sampler",
            ErrorCode::PredictorFailed => "Noise predictor failed during sampling",
            ErrorCode::IoError => "Failed to read or write a file",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::ConfigError => {
                "Use beta_schedule 'linear' or 'cosine', sampler 'ddpm' or 'ddim', \
                 1 <= num_inference_steps <= timesteps and 0 <= eta <= 1"
            }
            ErrorCode::ShapeError => {
                "Pass one timestep per batch element, each in [0, timesteps), \
                 and square images with non-zero dimensions"
            }
            ErrorCode::NumericError => {
                "Reduce the number of timesteps or move beta_end further from 1.0; \
                 restart sampling from fresh noise"
            }
            ErrorCode::PredictorFailed => {
                "Check the noise predictor accepts every emitted timestep and returns \
                 a tensor shaped like its input; restart sampling from fresh noise"
            }
            ErrorCode::IoError => "Check the path exists and is writable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for engine operations.
#[derive(Debug)]
pub struct DiffusionError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DiffusionError {
    /// Creates a new DiffusionError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new DiffusionError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a CONFIG_ERROR.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, reason)
    }

    /// Creates a CONFIG_ERROR for an unrecognised beta schedule.
    pub fn unknown_beta_schedule(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigError,
            format!("unknown beta schedule: '{}'", name),
        )
    }

    /// Creates a CONFIG_ERROR for an unrecognised sampler name.
    pub fn unknown_scheduler(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigError,
            format!("unknown scheduler: '{}'", name),
        )
    }

    /// Creates a CONFIG_ERROR for an invalid inference step count.
    pub fn invalid_step_count(steps: usize, timesteps: usize) -> Self {
        Self::new(
            ErrorCode::ConfigError,
            format!(
                "Invalid num_inference_steps: {} (must be between 1 and {})",
                steps, timesteps
            ),
        )
    }

    /// Creates a SHAPE_ERROR.
    pub fn shape(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ShapeError, reason)
    }

    /// Creates a SHAPE_ERROR for a timestep outside `[0, timesteps)`.
    pub fn timestep_out_of_range(t: usize, timesteps: usize) -> Self {
        Self::new(
            ErrorCode::ShapeError,
            format!("timestep {} out of range [0, {})", t, timesteps),
        )
    }

    /// Creates a NUMERIC_ERROR.
    pub fn numeric(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::NumericError, reason)
    }

    /// Creates a PREDICTOR_FAILED error.
    pub fn predictor_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PredictorFailed,
            format!("Prediction failed: {}", reason.into()),
        )
    }

    /// Creates an IO_ERROR wrapping the underlying cause.
    pub fn io(context: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::with_source(ErrorCode::IoError, context, source)
    }
}

impl fmt::Display for DiffusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for DiffusionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using DiffusionError.
pub type Result<T> = std::result::Result<T, DiffusionError>;
