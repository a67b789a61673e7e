use scholar_agent::{default_registry, CapabilityRegistry};
use serde_json::{json, Value};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    match serde_json::to_string_pretty(&describe(&default_registry())) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("tools", "serialization", error.to_string(), 1),
    }
}

/// Name, description, call signature and input schema per capability.
pub fn describe(registry: &CapabilityRegistry) -> Value {
    registry
        .descriptors()
        .into_iter()
        .map(|descriptor| {
            json!({
                "name": descriptor.name,
                "description": descriptor.description,
                "signature": descriptor.signature(),
                "input_schema": descriptor.input_schema(),
            })
        })
        .collect()
}
