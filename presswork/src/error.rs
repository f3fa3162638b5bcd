//! Error types for the report engine.
//!
//! Every failure that crosses the embedding boundary is an [`EngineError`]
//! variant, so hosts can discriminate by kind instead of parsing message
//! strings. Adapter-native errors are preserved inside
//! [`EngineError::StageFailed`].

use thiserror::Error;

use crate::adapter::AdapterError;

/// Pipeline stage for one job execution.
///
/// Jobs progress through stages in strict order. The stage is recorded on the
/// execution scope as an atomic u8 so the driver can report which stage was
/// in flight when a deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    /// Resolving the loader and loading the data payload
    Load = 0,
    /// Rendering the template against the payload
    Render = 1,
    /// Producing output files, one per declared format tag
    Generate = 2,
    /// Pushing the output files to the delivery targets
    Deliver = 3,
}

impl Stage {
    /// Converts from the u8 representation stored on the scope.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Load),
            1 => Some(Self::Render),
            2 => Some(Self::Generate),
            3 => Some(Self::Deliver),
            _ => None,
        }
    }

    /// Returns the stage name for logging and error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Render => "render",
            Self::Generate => "generate",
            Self::Deliver => "deliver",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors produced by the engine.
///
/// The variants are stable: hosts match on them to decide whether a failure
/// is a configuration problem (`InvalidJob`, `InvalidSchedule`), a missing
/// adapter (`NoLoader` and friends), back-pressure (`QueueFull`), lifecycle
/// (`EngineStopped`), or a runtime failure (`Timeout`, `StageFailed`).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A job failed an invariant check before acceptance.
    #[error("invalid job: {field}")]
    InvalidJob {
        /// The job field that failed validation.
        field: &'static str,
    },

    /// The schedule expression is empty or unparseable.
    #[error("invalid schedule: {detail}")]
    InvalidSchedule {
        /// Parser diagnostic, suitable for logging.
        detail: String,
    },

    /// No loader registered under the job's `data_source["type"]`.
    #[error("no loader registered for type {0:?}")]
    NoLoader(String),

    /// No renderer registered under the job's renderer name.
    #[error("no renderer registered for {0:?}")]
    NoRenderer(String),

    /// No output generator registered under a declared format tag.
    #[error("no output generator registered for {0:?}")]
    NoOutput(String),

    /// No delivery adapter registered under a delivery `type`.
    #[error("no delivery adapter registered for type {0:?}")]
    NoDelivery(String),

    /// The execution deadline was reached.
    #[error("execution timed out during {stage} stage")]
    Timeout {
        /// The stage that was in flight when the deadline fired.
        stage: Stage,
    },

    /// Non-blocking enqueue was rejected because the queue is at capacity.
    #[error("job queue is full")]
    QueueFull,

    /// The engine has been stopped; no further submissions are accepted.
    #[error("engine is stopped")]
    EngineStopped,

    /// An adapter returned an error; the stage tag says where.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        /// The stage whose adapter failed.
        stage: Stage,
        /// The adapter's own error.
        source: AdapterError,
    },
}

impl EngineError {
    /// Returns true for deadline-exhaustion failures.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short machine-readable kind tag, used in execution records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidJob { .. } => "invalid_job",
            Self::InvalidSchedule { .. } => "invalid_schedule",
            Self::NoLoader(_) => "no_loader",
            Self::NoRenderer(_) => "no_renderer",
            Self::NoOutput(_) => "no_output",
            Self::NoDelivery(_) => "no_delivery",
            Self::Timeout { .. } => "timeout",
            Self::QueueFull => "queue_full",
            Self::EngineStopped => "engine_stopped",
            Self::StageFailed { .. } => "stage_failed",
        }
    }
}
