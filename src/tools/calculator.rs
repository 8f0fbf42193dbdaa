//! Calculator toolkit.
//!
//! Arithmetic the agent can delegate to instead of computing in-context.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{AgentError, Result};
use crate::tool::{Arguments, Tool, ToolRegistry};

/// Create a Calculator toolkit with `add_numbers` and `subtract_numbers`.
pub fn calculator_toolkit() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AddNumbersTool);
    registry.register(SubtractNumbersTool);
    registry
}

pub struct AddNumbersTool;

#[async_trait]
impl Tool for AddNumbersTool {
    fn name(&self) -> &str {
        "add_numbers"
    }

    fn description(&self) -> &str {
        "Add two numbers together."
    }

    fn parameters(&self) -> Option<Value> {
        Some(binary_schema())
    }

    async fn call(&self, args: &Arguments) -> Result<Value> {
        let (a, b) = operands(args, self.name())?;
        Ok(number(a + b))
    }
}

pub struct SubtractNumbersTool;

#[async_trait]
impl Tool for SubtractNumbersTool {
    fn name(&self) -> &str {
        "subtract_numbers"
    }

    fn description(&self) -> &str {
        "Subtract the second number from the first."
    }

    fn parameters(&self) -> Option<Value> {
        Some(binary_schema())
    }

    async fn call(&self, args: &Arguments) -> Result<Value> {
        let (a, b) = operands(args, self.name())?;
        Ok(number(a - b))
    }
}

// Helper functions

fn binary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
        "required": ["a", "b"],
    })
}

fn operands(args: &Arguments, tool_name: &str) -> Result<(f64, f64)> {
    if let Some(extra) = args.keys().find(|key| *key != "a" && *key != "b") {
        return Err(AgentError::arguments(
            tool_name,
            format!("unexpected argument `{extra}`"),
        ));
    }
    Ok((
        get_number(args, "a", tool_name)?,
        get_number(args, "b", tool_name)?,
    ))
}

fn get_number(args: &Arguments, field: &str, tool_name: &str) -> Result<f64> {
    match args.get(field) {
        None => Err(AgentError::arguments(
            tool_name,
            format!("missing argument `{field}`"),
        )),
        Some(value) => value.as_f64().ok_or_else(|| {
            AgentError::arguments(
                tool_name,
                format!("argument `{field}` must be a number, got {value}"),
            )
        }),
    }
}

/// Integral results render as integers (`579`, not `579.0`).
fn number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
