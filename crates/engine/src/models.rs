//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow and its runs look
//! like in memory.  They serialize to/from camelCase JSON, which is also the
//! format workflow files use.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub use nodes::StepKind;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// How a workflow is meant to be started.  Stored only; the engine never
/// acts on triggers itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Webhook,
    Schedule,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub config: Value,
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// Retry policy for a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay; retry `n` waits `backoff_ms * n`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Unique identifier within this workflow (referenced by `depends_on`).
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Kind-specific configuration passed to the handler.
    #[serde(default)]
    pub config: Value,
    /// Steps that must be `completed` before this one may run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
}

impl WorkflowStep {
    /// Convenience constructor for testing.
    pub fn new(id: impl Into<String>, kind: StepKind, config: Value) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            config,
            depends_on: Vec::new(),
            retry_config: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.retry_config = Some(RetryConfig { max_retries, backoff_ms: Some(backoff_ms) });
        self
    }

    /// The variable this step's output is stored under, if any.
    pub fn output_variable(&self) -> Option<&str> {
        self.config.get("outputVariable").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,
    /// Initial execution variables; caller input overrides these.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

impl WorkflowDefinition {
    /// Convenience constructor for testing.
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            steps,
            triggers: Vec::new(),
            variables: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// Possible statuses for a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending   => write!(f, "pending"),
            Self::Running   => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed    => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Possible statuses for a single step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending   => write!(f, "pending"),
            Self::Running   => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed    => write!(f, "failed"),
            Self::Skipped   => write!(f, "skipped"),
        }
    }
}

/// Outcome of one step within one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of handler invocations made (0 for skipped steps).
    #[serde(default)]
    pub attempts: u32,
}

impl StepResult {
    /// A step whose handler has been invoked but not yet returned.
    pub fn running(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            output: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn completed(step_id: impl Into<String>, started_at: DateTime<Utc>, output: Value, attempts: u32) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Completed,
            started_at,
            completed_at: Some(Utc::now()),
            output: Some(output),
            error: None,
            attempts,
        }
    }

    pub fn failed(
        step_id: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Failed,
            started_at,
            completed_at: Some(Utc::now()),
            output: None,
            error: Some(error.into()),
            attempts,
        }
    }

    /// A step whose dependencies were not all `completed`.
    pub fn skipped(step_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id: step_id.into(),
            status: StepStatus::Skipped,
            started_at: now,
            completed_at: Some(now),
            output: None,
            error: Some(crate::DEPENDENCIES_NOT_MET.to_owned()),
            attempts: 0,
        }
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    /// UUIDv7: millisecond timestamp followed by random bits.
    pub id: Uuid,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub step_results: HashMap<String, StepResult>,
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    /// Start a run: `input` is shallow-merged over the workflow's variables.
    pub fn start(workflow: &WorkflowDefinition, input: Map<String, Value>) -> Self {
        let mut variables = workflow.variables.clone();
        variables.extend(input);

        Self {
            id: Uuid::now_v7(),
            workflow_id: workflow.id.clone(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            step_results: HashMap::new(),
            variables,
            error: None,
        }
    }

    /// Whether `step_id` has a `completed` result in this run.
    pub fn is_step_completed(&self, step_id: &str) -> bool {
        self.step_results
            .get(step_id)
            .is_some_and(|r| r.status == StepStatus::Completed)
    }

    /// Move to a terminal status and stamp `completed_at`.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        self.status = status;
        if error.is_some() {
            self.error = error;
        }
        self.completed_at = Some(Utc::now());
    }
}
