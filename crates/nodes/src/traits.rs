//! The `StepHandler` trait: the contract every step kind must fulfil.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{NodeError, Webhook};

/// The five step kinds a workflow may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Agent,
    Http,
    Transform,
    Condition,
    Wait,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent     => write!(f, "agent"),
            Self::Http      => write!(f, "http"),
            Self::Transform => write!(f, "transform"),
            Self::Condition => write!(f, "condition"),
            Self::Wait      => write!(f, "wait"),
        }
    }
}

/// Read access to named webhook configurations.
///
/// Implemented by the engine's workflow registry; `http` steps use it to
/// resolve `config.webhookName`.
pub trait WebhookDirectory: Send + Sync {
    fn webhook(&self, name: &str) -> Option<Webhook>;
}

/// Context passed to a handler for one step invocation.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// handlers can import it without a circular dependency.  `variables` is a
/// snapshot: handlers never write to it, the engine stores their output.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// ID of the workflow being executed.
    pub workflow_id: &'a str,
    /// ID of the current execution run.
    pub execution_id: uuid::Uuid,
    /// ID of the step being executed.
    pub step_id: &'a str,
    /// Execution variables as of the start of this step.
    pub variables: &'a Map<String, Value>,
    /// Named webhooks available to `http` steps.
    pub webhooks: &'a dyn WebhookDirectory,
}

/// The core handler trait.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Execute one step given its raw `config` mapping and return the step's
    /// output value.
    async fn execute(
        &self,
        config: &Value,
        ctx: &ExecutionContext<'_>,
    ) -> Result<Value, NodeError>;
}
