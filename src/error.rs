//! Errors surfaced by tasks and configuration.

use std::error::Error as StdError;

/// Boxed error carried out of caller-supplied steps.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Final value of a cooperative task.
pub type TaskResult = Result<(), TaskError>;

/// Failure reported by a task to the host scheduler.
///
/// The sequencer never recovers from these; they surface through whatever the
/// host does with a failed task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A fallible action at `index` in a composed sequence returned an error.
    #[error("sequence step {index} failed")]
    Step {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// A hand-written routine gave up.
    #[error("routine failed")]
    Routine(#[source] BoxError),
}

impl TaskError {
    pub fn routine<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        TaskError::Routine(err.into())
    }
}

/// Rejected configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be finite and non-negative, got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error(transparent)]
    Extract(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(Box::new(err))
    }
}
