use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::parse_config;
use crate::template::{extract_path, interpolate};
use crate::{ExecutionContext, NodeError, StepHandler};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransformConfig {
    /// Unknown or missing types pass the input through unchanged.
    #[serde(default)]
    transform_type: Option<String>,
    /// Variable to read; the whole variable mapping when absent.
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    sources: Option<Vec<String>>,
    #[serde(default)]
    template: Option<String>,
}

/// Reshapes execution data: parse, stringify, extract, merge, or template.
pub struct TransformHandler;

#[async_trait]
impl StepHandler for TransformHandler {
    async fn execute(&self, config: &Value, ctx: &ExecutionContext<'_>) -> Result<Value, NodeError> {
        let config: TransformConfig = parse_config(config)?;
        debug!(
            execution_id = %ctx.execution_id,
            step_id = ctx.step_id,
            transform_type = config.transform_type.as_deref().unwrap_or("passthrough"),
            "applying transform"
        );
        apply(&config, ctx.variables)
    }
}

fn apply(config: &TransformConfig, variables: &Map<String, Value>) -> Result<Value, NodeError> {
    let input = match &config.input {
        Some(name) => variables.get(name).cloned().unwrap_or(Value::Null),
        None => Value::Object(variables.clone()),
    };

    match config.transform_type.as_deref().unwrap_or_default() {
        "json-parse" => match input {
            Value::String(text) => serde_json::from_str(&text)
                .map_err(|e| NodeError::Transform(format!("json-parse: {e}"))),
            other => Ok(other),
        },
        "json-stringify" => serde_json::to_string_pretty(&input)
            .map(Value::String)
            .map_err(|e| NodeError::Transform(format!("json-stringify: {e}"))),
        "extract" => {
            let path = required(&config.path, "path")?;
            Ok(extract_path(&input, path).cloned().unwrap_or(Value::Null))
        }
        "merge" => {
            let sources = config
                .sources
                .as_ref()
                .ok_or_else(|| NodeError::InvalidConfig("merge requires `sources`".into()))?;
            let mut merged = Map::new();
            for source in sources {
                if let Some(Value::Object(fields)) = variables.get(source) {
                    merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Ok(Value::Object(merged))
        }
        "template" => {
            let template = required(&config.template, "template")?;
            Ok(Value::String(interpolate(template, variables)))
        }
        _ => Ok(input),
    }
}

fn required<'c>(value: &'c Option<String>, key: &str) -> Result<&'c str, NodeError> {
    value
        .as_deref()
        .ok_or_else(|| NodeError::InvalidConfig(format!("transform requires `{key}`")))
}
