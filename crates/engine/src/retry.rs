//! Retry controller: one step, bounded attempts, linear backoff.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use nodes::{ExecutionContext, NodeError, StepHandler};

use crate::models::{StepResult, WorkflowStep};

/// Invoke `handler` for `step`, retrying failures per `step.retry_config`.
///
/// Retry `n` (1-based) is preceded by a sleep of `backoff * n`.  The step's
/// own `backoff_ms` wins over `default_backoff`.  Cancellation interrupts
/// both the handler and the sleep, and is never retried.
pub(crate) async fn execute_with_retry(
    handler: &dyn StepHandler,
    step: &WorkflowStep,
    ctx: &ExecutionContext<'_>,
    default_backoff: Duration,
    cancel: &CancellationToken,
) -> StepResult {
    let started_at = Utc::now();
    let max_retries = step.retry_config.map_or(0, |r| r.max_retries);
    let backoff = step
        .retry_config
        .and_then(|r| r.backoff_ms)
        .map_or(default_backoff, Duration::from_millis);

    let mut retries = 0u32;

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NodeError::Cancelled),
            result = handler.execute(&step.config, ctx) => result,
        };
        let attempts = retries + 1;

        let err = match outcome {
            Ok(output) => return StepResult::completed(&step.id, started_at, output, attempts),
            Err(err) => err,
        };

        if !err.is_retryable() || retries >= max_retries {
            error!(step_id = %step.id, attempts, "step failed: {}", err);
            return StepResult::failed(&step.id, started_at, err.to_string(), attempts);
        }

        retries += 1;
        let delay = backoff * retries;
        warn!(
            "step '{}' failed (retry {}/{}), retrying in {:?}: {}",
            step.id, retries, max_retries, delay, err
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return StepResult::failed(&step.id, started_at, NodeError::Cancelled.to_string(), attempts);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
