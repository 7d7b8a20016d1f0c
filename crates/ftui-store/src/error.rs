#![forbid(unsafe_code)]

use ftui_path::SyntaxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The job queue is full. Almost always an update cascade that keeps
    /// scheduling more updates from inside callbacks.
    #[error("maximal simultaneous jobs limit reached ({limit})")]
    QueueOverflow { limit: usize },

    /// Draining the queue kept producing new work.
    #[error("job queue did not settle after {runs} drain rounds")]
    QueueRunsExhausted { runs: usize },

    #[error("invalid path syntax: {0}")]
    InvalidSyntax(#[from] SyntaxError),

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the error reports runaway recursion rather than bad input.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::QueueOverflow { .. } | Self::QueueRunsExhausted { .. }
        )
    }
}
