//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine.
///
/// Step failures never appear here: they are recorded in the execution's
/// `StepResult`s.  Only lookups fail outright, plus the cycle error, which
/// `execute` captures into the execution record instead of returning.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// No workflow is registered under the given ID.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// No webhook is registered under the given name.
    #[error("webhook not found: {0}")]
    WebhookNotFound(String),

    /// Dependency resolution revisited a step that was still being visited.
    #[error("circular dependency detected at step '{0}'")]
    CircularDependency(String),

    /// Webhook invocation failed in transport.
    #[error("webhook call failed: {0}")]
    Node(#[from] nodes::NodeError),
}
