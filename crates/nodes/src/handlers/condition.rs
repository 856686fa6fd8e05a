use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::parse_config;
use crate::{ExecutionContext, NodeError, StepHandler};

#[derive(Debug, Deserialize)]
struct ConditionConfig {
    variable: String,
    #[serde(default)]
    operator: Option<String>,
    /// `None` only when the key is missing; an explicit `null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Compares a variable against a configured value and returns a boolean.
pub struct ConditionHandler;

#[async_trait]
impl StepHandler for ConditionHandler {
    async fn execute(&self, config: &Value, ctx: &ExecutionContext<'_>) -> Result<Value, NodeError> {
        let config: ConditionConfig = parse_config(config)?;
        let actual = ctx.variables.get(&config.variable);
        let operator = config.operator.as_deref().unwrap_or_default();
        let result = evaluate(operator, actual, config.value.as_ref());
        debug!(
            execution_id = %ctx.execution_id,
            step_id = ctx.step_id,
            operator,
            result,
            "condition evaluated"
        );
        Ok(Value::Bool(result))
    }
}

/// Evaluate `actual <operator> expected`.  `None` stands for an absent value.
/// Unknown or empty operators evaluate to `false`.
pub(crate) fn evaluate(operator: &str, actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match operator {
        "equals" => strict_equals(actual, expected),
        "notEquals" => !strict_equals(actual, expected),
        "contains" => to_text(actual).contains(&to_text(expected)),
        "greaterThan" => to_number(actual) > to_number(expected),
        "lessThan" => to_number(actual) < to_number(expected),
        "exists" => !matches!(actual, None | Some(Value::Null)),
        "truthy" => is_truthy(actual),
        _ => false,
    }
}

/// Type-and-value equality; numbers compare by magnitude (`1 == 1.0`).
fn strict_equals(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (x, y) => x == y,
    }
}

/// String coercion used by `contains`.
fn to_text(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_owned(),
        Some(Value::Null) => "null".to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_text(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_owned(),
        Some(other) => other.to_string(),
    }
}

/// Numeric coercion used by `greaterThan`/`lessThan`; NaN never compares.
fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(Some(single)),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
