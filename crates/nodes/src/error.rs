//! Node-level error type.

use thiserror::Error;

/// Errors returned by a step handler or one of its collaborators.
///
/// The engine does not distinguish transient from permanent failures: every
/// variant except `Cancelled` is retried while the step's retry budget lasts.
/// The `Display` text becomes the step's recorded error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// The step's `config` is missing a required key or has the wrong shape.
    #[error("invalid step config: {0}")]
    InvalidConfig(String),

    /// The chat-completion collaborator failed.
    #[error("chat request failed: {0}")]
    Chat(String),

    /// The HTTP transport failed before a response was received.
    #[error("http request failed: {0}")]
    Transport(String),

    /// A transform could not be applied to its input.
    #[error("transform failed: {0}")]
    Transform(String),

    /// Generic handler failure (used by test doubles and custom handlers).
    #[error("{0}")]
    Failed(String),

    /// The execution was cancelled while the step was in flight.
    #[error("step cancelled")]
    Cancelled,
}

impl NodeError {
    /// Whether the retry controller may attempt this step again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
