//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Looks up the workflow and creates a `running` execution record.
//! 2. Resolves a dependency order once (a cycle fails the execution).
//! 3. Walks the steps in order, skipping those whose dependencies did not
//!    complete and running the rest through the retry controller.
//! 4. Stores each successful step's output under its `outputVariable`.
//! 5. Stops at the first failed step that has no retry policy.
//!
//! The execution store receives a snapshot after every step, so readers can
//! follow a run while it is in flight.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use nodes::{ExecutionContext, HandlerRegistry};

use crate::dag::resolve_order;
use crate::models::{
    ExecutionStatus, StepResult, StepStatus, WorkflowDefinition, WorkflowExecution, WorkflowStep,
};
use crate::registry::WorkflowRegistry;
use crate::retry::execute_with_retry;
use crate::store::ExecutionStore;
use crate::{EngineError, EXECUTION_CANCELLED};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Retry backoff base for steps whose `retryConfig` omits `backoffMs`.
    pub default_backoff: Duration,
    /// Maximum number of records returned by execution listings.
    pub list_limit: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_backoff: Duration::from_millis(1000),
            list_limit: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Runs workflow executions against a shared registry and store.
///
/// Each call to [`WorkflowExecutor::execute`] owns its execution record and
/// variables; only the registry and store are shared between calls.
pub struct WorkflowExecutor {
    registry: Arc<WorkflowRegistry>,
    store: Arc<ExecutionStore>,
    handlers: HandlerRegistry,
    config: ExecutorConfig,
}

/// How the step walk ended.
enum Halt {
    Failed(String),
    Cancelled,
}

impl WorkflowExecutor {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        store: Arc<ExecutionStore>,
        handlers: HandlerRegistry,
        config: ExecutorConfig,
    ) -> Self {
        Self { registry, store, handlers, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a registered workflow to completion.
    ///
    /// # Errors
    /// Only [`EngineError::WorkflowNotFound`]; every other failure is
    /// reported through the returned record's `status` and `error`.
    pub async fn execute(
        &self,
        workflow_id: &str,
        input: Map<String, Value>,
    ) -> Result<WorkflowExecution, EngineError> {
        self.execute_with_cancel(workflow_id, input, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), but `cancel` aborts the run: the step
    /// in flight is recorded as failed and the execution ends `cancelled`.
    #[instrument(skip(self, input, cancel))]
    pub async fn execute_with_cancel(
        &self,
        workflow_id: &str,
        input: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecution, EngineError> {
        let workflow = self
            .registry
            .get(workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_owned()))?;

        let mut execution = WorkflowExecution::start(&workflow, input);
        self.store.save(&execution);
        info!(execution_id = %execution.id, "execution started");

        match self.run_steps(&workflow, &mut execution, cancel).await {
            Ok(None) => execution.finish(ExecutionStatus::Completed, None),
            Ok(Some(Halt::Failed(message))) => execution.finish(ExecutionStatus::Failed, Some(message)),
            Ok(Some(Halt::Cancelled)) => {
                execution.finish(ExecutionStatus::Cancelled, Some(EXECUTION_CANCELLED.to_owned()))
            }
            Err(e) => execution.finish(ExecutionStatus::Failed, Some(e.to_string())),
        }

        self.store.save(&execution);

        match execution.status {
            ExecutionStatus::Completed => info!(execution_id = %execution.id, "execution completed"),
            status => error!(
                execution_id = %execution.id,
                %status,
                error = execution.error.as_deref().unwrap_or_default(),
                "execution did not complete"
            ),
        }

        Ok(execution)
    }

    /// Walk the resolved steps.  `Ok(None)` means every step was processed
    /// and none failed.
    async fn run_steps(
        &self,
        workflow: &WorkflowDefinition,
        execution: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> Result<Option<Halt>, EngineError> {
        let order = resolve_order(&workflow.steps)?;
        debug!(
            "resolved {} steps in order: {:?}",
            order.len(),
            order.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
        );

        // First failure of a step that had a retry policy: the walk goes on,
        // but the execution can no longer complete.
        let mut exhausted: Option<String> = None;

        for step in order {
            if cancel.is_cancelled() {
                return Ok(Some(Halt::Cancelled));
            }

            if !step.depends_on.iter().all(|dep| execution.is_step_completed(dep)) {
                warn!(step_id = %step.id, "dependencies not met, skipping step");
                execution
                    .step_results
                    .insert(step.id.clone(), StepResult::skipped(&step.id));
                self.store.save(execution);
                continue;
            }

            let result = self.run_step(workflow, step, execution, cancel).await;
            let status = result.status;
            let error = result.error.clone();

            if status == StepStatus::Completed {
                info!(step_id = %step.id, attempts = result.attempts, "step completed");
                if let (Some(name), Some(output)) = (step.output_variable(), &result.output) {
                    execution.variables.insert(name.to_owned(), output.clone());
                }
            }

            execution.step_results.insert(step.id.clone(), result);
            self.store.save(execution);

            if status == StepStatus::Failed {
                if cancel.is_cancelled() {
                    return Ok(Some(Halt::Cancelled));
                }
                let message = error.unwrap_or_else(|| format!("step '{}' failed", step.id));
                if step.retry_config.is_none() {
                    return Ok(Some(Halt::Failed(message)));
                }
                exhausted.get_or_insert(message);
            }
        }

        Ok(exhausted.map(Halt::Failed))
    }

    #[instrument(skip_all, fields(step_id = %step.id, kind = %step.kind))]
    async fn run_step(
        &self,
        workflow: &WorkflowDefinition,
        step: &WorkflowStep,
        execution: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> StepResult {
        let running = StepResult::running(&step.id);
        let started_at = running.started_at;
        execution.step_results.insert(step.id.clone(), running);
        self.store.save(execution);

        let Some(handler) = self.handlers.get(&step.kind) else {
            return StepResult::failed(
                &step.id,
                started_at,
                format!("no handler registered for step type '{}'", step.kind),
                0,
            );
        };

        let ctx = ExecutionContext {
            workflow_id: &workflow.id,
            execution_id: execution.id,
            step_id: &step.id,
            variables: &execution.variables,
            webhooks: self.registry.as_ref(),
        };

        execute_with_retry(handler.as_ref(), step, &ctx, self.config.default_backoff, cancel).await
    }
}
