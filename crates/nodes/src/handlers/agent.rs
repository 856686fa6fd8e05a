use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::parse_config;
use crate::template::interpolate;
use crate::{ChatClient, ChatMessage, ExecutionContext, NodeError, StepHandler};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentConfig {
    prompt: String,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f32>,
}

/// Sends the interpolated prompt to the chat collaborator and returns the
/// response text.
pub struct AgentHandler {
    chat: Arc<dyn ChatClient>,
}

impl AgentHandler {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl StepHandler for AgentHandler {
    async fn execute(&self, config: &Value, ctx: &ExecutionContext<'_>) -> Result<Value, NodeError> {
        let config: AgentConfig = parse_config(config)?;

        let messages = [
            ChatMessage::system(config.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)),
            ChatMessage::user(interpolate(&config.prompt, ctx.variables)),
        ];

        let response = self
            .chat
            .chat(
                &messages,
                config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            )
            .await?;

        debug!(
            workflow_id = ctx.workflow_id,
            execution_id = %ctx.execution_id,
            step_id = ctx.step_id,
            usage = ?response.usage,
            "agent step answered"
        );
        Ok(Value::String(response.content))
    }
}
