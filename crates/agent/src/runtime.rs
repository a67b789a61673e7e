use std::sync::Arc;
use std::time::Duration;

use scholar_core::config::AppConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::citations::{extract_citations, Citation};
use crate::conversation::ConversationState;
use crate::llm::{CompletionError, CompletionOptions, LlmClient};
use crate::parser::parse_function_calls;
use crate::prompt;
use crate::tools::{CapabilityRegistry, FunctionResult};

pub const APOLOGY_MESSAGE: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorSettings {
    pub history_window: usize,
    pub completion_timeout: Duration,
    pub capability_timeout: Duration,
    pub completion_options: CompletionOptions,
    /// Replaces the generated system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            history_window: 10,
            completion_timeout: Duration::from_secs(30),
            capability_timeout: Duration::from_secs(30),
            completion_options: CompletionOptions::default(),
            system_prompt: None,
        }
    }
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            history_window: config.agent.history_window,
            completion_timeout: Duration::from_secs(config.llm.timeout_secs),
            capability_timeout: Duration::from_secs(config.agent.capability_timeout_secs),
            completion_options: CompletionOptions::from(&config.llm),
            system_prompt: config.agent.system_prompt.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentResponse {
    pub content: String,
    pub citations: Vec<Citation>,
    pub functions_invoked: Vec<String>,
}

impl AgentResponse {
    pub fn apology() -> Self {
        Self {
            content: APOLOGY_MESSAGE.to_owned(),
            citations: Vec::new(),
            functions_invoked: Vec::new(),
        }
    }

    fn from_final_text(content: String, functions_invoked: Vec<String>) -> Self {
        let citations = extract_citations(&content);
        Self { content, citations, functions_invoked }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingFirstCompletion,
    DispatchingCalls,
    AwaitingFinalCompletion,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingFirstCompletion => "awaiting_first_completion",
            Self::DispatchingCalls => "dispatching_calls",
            Self::AwaitingFinalCompletion => "awaiting_final_completion",
        }
    }
}

/// Drives the detect-then-resolve completion protocol for one session.
///
/// Owns the session's conversation and capability registry. `process_message`
/// takes `&mut self`, so a caller sharing an orchestrator must serialize
/// access (see `SessionStore`).
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    registry: CapabilityRegistry,
    conversation: ConversationState,
    settings: OrchestratorSettings,
    system_prompt: String,
    session_id: String,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        mut registry: CapabilityRegistry,
        settings: OrchestratorSettings,
    ) -> Self {
        registry.set_timeout(settings.capability_timeout);
        let system_prompt = settings
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompt::default_system_prompt(&registry.descriptors()));

        Self {
            llm,
            registry,
            conversation: ConversationState::new(system_prompt.clone()),
            settings,
            system_prompt,
            session_id: String::new(),
            phase: Phase::Idle,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub async fn process_message(&mut self, text: &str) -> AgentResponse {
        info!(
            event_name = "agent.message.received",
            session_id = %self.session_id,
            chars = text.chars().count(),
            "processing user message"
        );

        self.conversation.append_user(text);
        let history = self.conversation.recent_suffix(self.settings.history_window);
        let first_prompt = prompt::build(&self.system_prompt, history, text);

        self.transition(Phase::AwaitingFirstCompletion);
        let first = match self.complete(&first_prompt).await {
            Ok(first) => first,
            Err(error) => return self.fail(error),
        };

        let calls = parse_function_calls(&first);
        if calls.is_empty() {
            return self.finish(AgentResponse::from_final_text(first, Vec::new()));
        }

        self.transition(Phase::DispatchingCalls);
        let mut results: Vec<FunctionResult> = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.registry.invoke(&call.name, call.parameters).await);
        }
        let functions_invoked = results.iter().map(|result| result.name.clone()).collect();

        self.transition(Phase::AwaitingFinalCompletion);
        let second_prompt = prompt::build_with_results(text, &results);
        match self.complete(&second_prompt).await {
            Ok(content) => self.finish(AgentResponse::from_final_text(content, functions_invoked)),
            Err(error) => self.fail(error),
        }
    }

    /// Starts a fresh conversation holding only the system turn.
    pub fn reset(&mut self) {
        self.conversation.reset(self.system_prompt.clone());
        info!(event_name = "agent.session.reset", session_id = %self.session_id, "conversation reset");
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let timeout = self.settings.completion_timeout;
        match tokio::time::timeout(
            timeout,
            self.llm.complete(prompt, &self.settings.completion_options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CompletionError::TimedOut(timeout)),
        }
    }

    fn finish(&mut self, response: AgentResponse) -> AgentResponse {
        self.conversation.append_assistant(response.content.clone());
        info!(
            event_name = "agent.message.completed",
            session_id = %self.session_id,
            citations = response.citations.len(),
            functions_invoked = ?response.functions_invoked,
            "response ready"
        );
        self.transition(Phase::Idle);
        response
    }

    fn fail(&mut self, error: CompletionError) -> AgentResponse {
        warn!(
            event_name = "agent.completion.failed",
            session_id = %self.session_id,
            phase = self.phase.as_str(),
            error = %error,
            "completion failed; returning apology"
        );
        self.transition(Phase::Idle);
        AgentResponse::apology()
    }

    fn transition(&mut self, next: Phase) {
        debug!(session_id = %self.session_id, from = self.phase.as_str(), to = next.as_str(), "orchestrator transition");
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use scholar_core::config::AppConfig;

    use super::{AgentResponse, Orchestrator, OrchestratorSettings, APOLOGY_MESSAGE};
    use crate::conversation::Role;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::CapabilityRegistry;

    fn orchestrator(client: Arc<ScriptedLlmClient>, settings: OrchestratorSettings) -> Orchestrator {
        Orchestrator::new(client, CapabilityRegistry::new(), settings)
    }

    #[tokio::test]
    async fn direct_answer_takes_single_pass() {
        let client = Arc::new(ScriptedLlmClient::new([Ok("Plain answer.".to_owned())]));
        let mut orchestrator = orchestrator(client.clone(), OrchestratorSettings::default());

        let response = orchestrator.process_message("hello").await;

        assert_eq!(response.content, "Plain answer.");
        assert!(response.functions_invoked.is_empty());
        assert_eq!(client.prompts().await.len(), 1);
        assert_eq!(orchestrator.conversation().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_timeout_yields_apology() {
        let client = Arc::new(
            ScriptedLlmClient::new([Ok("too late".to_owned())])
                .with_latency(Duration::from_secs(120)),
        );
        let settings = OrchestratorSettings {
            completion_timeout: Duration::from_secs(5),
            ..OrchestratorSettings::default()
        };
        let mut orchestrator = orchestrator(client, settings);

        let response = orchestrator.process_message("anyone there?").await;

        assert_eq!(response, AgentResponse::apology());
        assert_eq!(response.content, APOLOGY_MESSAGE);
        assert_eq!(orchestrator.conversation().len(), 2);
    }

    #[tokio::test]
    async fn reset_keeps_configured_system_prompt() {
        let client = Arc::new(ScriptedLlmClient::new([Ok("ok".to_owned())]));
        let settings = OrchestratorSettings {
            system_prompt: Some("Custom rules".to_owned()),
            ..OrchestratorSettings::default()
        };
        let mut orchestrator = orchestrator(client, settings);
        orchestrator.process_message("hi").await;

        orchestrator.reset();

        assert_eq!(orchestrator.conversation().len(), 1);
        assert_eq!(orchestrator.conversation().turns()[0].role, Role::System);
        assert_eq!(orchestrator.system_prompt(), "Custom rules");
    }

    #[test]
    fn settings_follow_app_config() {
        let mut config = AppConfig::default();
        config.agent.history_window = 4;
        config.agent.capability_timeout_secs = 7;
        config.llm.timeout_secs = 9;

        let settings = OrchestratorSettings::from(&config);

        assert_eq!(settings.history_window, 4);
        assert_eq!(settings.capability_timeout, Duration::from_secs(7));
        assert_eq!(settings.completion_timeout, Duration::from_secs(9));
        assert_eq!(settings.system_prompt, None);
    }

    #[test]
    fn generated_system_prompt_reflects_empty_registry() {
        let client = Arc::new(ScriptedLlmClient::default());
        let orchestrator = orchestrator(client, OrchestratorSettings::default());
        assert!(orchestrator.system_prompt().contains("No functions are available"));
    }
}
