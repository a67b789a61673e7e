//! Agent Runtime - two-pass orchestration between a completion service and
//! callable capabilities
//!
//! This crate provides the "brain" of the research assistant:
//! - Keeps per-session conversation history (`conversation`)
//! - Detects capability requests in model output (`parser`)
//! - Dispatches them through an isolated registry (`tools`)
//! - Folds results into a final, citation-annotated answer (`runtime`, `citations`)
//!
//! # Architecture
//!
//! Each user message runs a constrained loop:
//! 1. **First pass** (`prompt`) - system prompt + bounded history + user text
//! 2. **Detection** (`parser`) - `<call name="...">{...}</call>` blocks
//! 3. **Dispatch** (`tools`) - sequential, in order of appearance
//! 4. **Second pass** - results serialized back to the model
//! 5. **Citations** (`citations`) - `[Source: name]` markers in the final text
//!
//! # Key Types
//!
//! - `Orchestrator` - per-session state machine (see `runtime` module)
//! - `SessionStore` - session id → orchestrator, one in-flight message per session
//! - `LlmClient` - pluggable completion service (OpenAI/Anthropic/Ollama)
//! - `CapabilityRegistry` - descriptor + invoker table

pub mod citations;
pub mod conversation;
pub mod llm;
pub mod parser;
pub mod plugins;
pub mod prompt;
pub mod runtime;
pub mod session;
pub mod tools;

pub use citations::{extract_citations, Citation};
pub use conversation::{ConversationState, Role, Turn};
pub use llm::{
    client_from_config, CompletionError, CompletionOptions, LlmClient, ScriptedLlmClient,
};
pub use parser::{parse_function_calls, FunctionCall};
pub use plugins::default_registry;
pub use runtime::{AgentResponse, Orchestrator, OrchestratorSettings, APOLOGY_MESSAGE};
pub use session::{SessionError, SessionStore, SessionStoreBuilder};
pub use tools::{
    CapabilityDescriptor, CapabilityError, CapabilityInvoker, CapabilityRegistry, FunctionResult,
    ParameterKind, ParameterSpec, Parameters,
};
