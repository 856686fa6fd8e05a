use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_config;
use crate::{ExecutionContext, NodeError, StepHandler};

const DEFAULT_DURATION_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct WaitConfig {
    #[serde(default)]
    duration: Option<u64>,
}

/// Suspends for `config.duration` milliseconds.
pub struct WaitHandler;

#[async_trait]
impl StepHandler for WaitHandler {
    async fn execute(&self, config: &Value, _ctx: &ExecutionContext<'_>) -> Result<Value, NodeError> {
        let config: WaitConfig = parse_config(config)?;
        let duration = Duration::from_millis(config.duration.unwrap_or(DEFAULT_DURATION_MS));
        tokio::time::sleep(duration).await;
        Ok(json!({ "waited": true }))
    }
}
