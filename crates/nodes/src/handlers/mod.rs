//! Built-in step handlers, one per [`StepKind`].

mod agent;
mod condition;
mod http;
mod transform;
mod wait;

pub use agent::{AgentHandler, DEFAULT_SYSTEM_PROMPT};
pub use condition::ConditionHandler;
pub use http::HttpHandler;
pub use transform::TransformHandler;
pub use wait::WaitHandler;

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{ChatClient, HttpTransport, NodeError, StepHandler, StepKind};

/// Maps each step kind to the handler that executes it.
pub type HandlerRegistry = HashMap<StepKind, Arc<dyn StepHandler>>;

/// Registry with the five built-in handlers wired to the given collaborators.
pub fn default_registry(
    chat: Arc<dyn ChatClient>,
    transport: Arc<dyn HttpTransport>,
) -> HandlerRegistry {
    let mut registry: HandlerRegistry = HashMap::new();
    registry.insert(StepKind::Agent, Arc::new(AgentHandler::new(chat)));
    registry.insert(StepKind::Http, Arc::new(HttpHandler::new(transport)));
    registry.insert(StepKind::Transform, Arc::new(TransformHandler));
    registry.insert(StepKind::Condition, Arc::new(ConditionHandler));
    registry.insert(StepKind::Wait, Arc::new(WaitHandler));
    registry
}

/// Deserialize a step's raw config; a missing (`null`) config reads as `{}`.
pub(crate) fn parse_config<T: DeserializeOwned>(config: &Value) -> Result<T, NodeError> {
    let value = match config {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| NodeError::InvalidConfig(e.to_string()))
}
