use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub type Parameters = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().map(|number| number.fract() == 0.0).unwrap_or(false)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn required(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), kind, description: description.into(), required: true, default: None }
    }

    pub fn optional(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), kind, description: description.into(), required: false, default: None }
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Name, description and parameter schema of one capability.
///
/// Parameters keep their declaration order, which is the order they are
/// advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), parameters: Vec::new() }
    }

    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        if let Some(existing) = self.parameters.iter_mut().find(|current| current.name == spec.name) {
            *existing = spec;
        } else {
            self.parameters.push(spec);
        }
        self
    }

    /// `name(param, param)` as listed in the system prompt.
    pub fn signature(&self) -> String {
        let parameters =
            self.parameters.iter().map(|spec| spec.name.as_str()).collect::<Vec<_>>().join(", ");
        format!("{}({parameters})", self.name)
    }

    /// JSON-schema style object describing the accepted parameters.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.parameters {
            let mut property = json!({
                "type": spec.kind.as_str(),
                "description": spec.description,
            });
            if let (Some(default), Some(object)) = (&spec.default, property.as_object_mut()) {
                object.insert("default".to_owned(), default.clone());
            }
            properties.insert(spec.name.clone(), property);
            if spec.required {
                required.push(Value::String(spec.name.clone()));
            }
        }

        json!({ "type": "object", "properties": properties, "required": required })
    }

    /// Applies defaults and checks required parameters and types.
    ///
    /// Explicit `null` counts as absent. Parameters not declared in the schema
    /// are passed through untouched.
    pub fn validate(&self, mut parameters: Parameters) -> Result<Parameters, CapabilityError> {
        for spec in &self.parameters {
            let present = parameters.get(&spec.name).map(|value| !value.is_null()).unwrap_or(false);
            if !present {
                parameters.remove(&spec.name);
                if let Some(default) = &spec.default {
                    parameters.insert(spec.name.clone(), default.clone());
                } else if spec.required {
                    return Err(CapabilityError::MissingParameter {
                        capability: self.name.clone(),
                        parameter: spec.name.clone(),
                    });
                }
                continue;
            }

            let accepted = parameters.get(&spec.name).map(|value| spec.kind.accepts(value));
            if accepted == Some(false) {
                return Err(CapabilityError::InvalidParameterType {
                    capability: self.name.clone(),
                    parameter: spec.name.clone(),
                    expected: spec.kind.as_str(),
                });
            }
        }

        Ok(parameters)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capability `{0}` not found")]
    NotFound(String),
    #[error("capability `{capability}` requires parameter `{parameter}`")]
    MissingParameter { capability: String, parameter: String },
    #[error("capability `{capability}` expects parameter `{parameter}` to be {expected}")]
    InvalidParameterType { capability: String, parameter: String, expected: &'static str },
    #[error("capability `{capability}` timed out after {timeout:?}")]
    TimedOut { capability: String, timeout: Duration },
    #[error("capability `{capability}` panicked")]
    Panicked { capability: String },
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    async fn invoke(&self, parameters: Parameters) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> CapabilityInvoker for F
where
    F: Fn(Parameters) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        (self)(parameters).await
    }
}

/// Outcome of one attempted function call, in the order calls were parsed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionResult {
    pub name: String,
    pub value: Value,
    pub success: bool,
}

impl FunctionResult {
    pub fn succeeded(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value, success: true }
    }

    pub fn failed(name: impl Into<String>, error: &CapabilityError) -> Self {
        Self { name: name.into(), value: Value::String(format!("Error: {error}")), success: false }
    }
}

struct RegisteredCapability {
    descriptor: CapabilityDescriptor,
    invoker: Arc<dyn CapabilityInvoker>,
}

/// Descriptor + invoker table. Registering an existing name replaces it.
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, RegisteredCapability>,
    timeout: Option<Duration>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn register<I>(&mut self, descriptor: CapabilityDescriptor, invoker: I)
    where
        I: CapabilityInvoker + 'static,
    {
        let name = descriptor.name.clone();
        let replaced = self
            .capabilities
            .insert(name.clone(), RegisteredCapability { descriptor, invoker: Arc::new(invoker) })
            .is_some();
        if replaced {
            debug!(capability = %name, "capability re-registered; previous entry replaced");
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn CapabilityInvoker>, CapabilityError> {
        self.capabilities
            .get(name)
            .map(|capability| Arc::clone(&capability.invoker))
            .ok_or_else(|| CapabilityError::NotFound(name.to_owned()))
    }

    pub fn descriptor(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.capabilities.get(name).map(|capability| &capability.descriptor)
    }

    /// Registered descriptors sorted by name.
    pub fn descriptors(&self) -> Vec<&CapabilityDescriptor> {
        let mut descriptors =
            self.capabilities.values().map(|capability| &capability.descriptor).collect::<Vec<_>>();
        descriptors.sort_by(|left, right| left.name.cmp(&right.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Invokes a capability, folding every failure into the returned result.
    pub async fn invoke(&self, name: &str, parameters: Parameters) -> FunctionResult {
        match self.try_invoke(name, parameters).await {
            Ok(value) => {
                debug!(
                    event_name = "agent.capability.invoked",
                    capability = %name,
                    success = true,
                    "capability invocation succeeded"
                );
                FunctionResult::succeeded(name, value)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.capability.invoked",
                    capability = %name,
                    success = false,
                    error = %error,
                    "capability invocation failed"
                );
                FunctionResult::failed(name, &error)
            }
        }
    }

    pub async fn try_invoke(
        &self,
        name: &str,
        parameters: Parameters,
    ) -> Result<Value, CapabilityError> {
        let capability =
            self.capabilities.get(name).ok_or_else(|| CapabilityError::NotFound(name.to_owned()))?;
        let parameters = capability.descriptor.validate(parameters)?;

        let invoker = Arc::clone(&capability.invoker);
        let mut task = tokio::spawn(async move { invoker.invoke(parameters).await });

        let joined = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(CapabilityError::TimedOut { capability: name.to_owned(), timeout });
                }
            },
            None => task.await,
        };

        match joined {
            Ok(outcome) => outcome.map_err(|error| CapabilityError::Failed(format!("{error:#}"))),
            Err(join_error) if join_error.is_panic() => {
                Err(CapabilityError::Panicked { capability: name.to_owned() })
            }
            Err(join_error) => Err(CapabilityError::Failed(join_error.to_string())),
        }
    }
}
