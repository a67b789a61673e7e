use std::collections::HashMap;
use std::sync::Arc;

use scholar_core::config::AppConfig;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::plugins::default_registry;
use crate::runtime::{AgentResponse, Orchestrator, OrchestratorSettings};
use crate::tools::CapabilityRegistry;

pub type RegistryFactory = Arc<dyn Fn() -> CapabilityRegistry + Send + Sync>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session id must not be empty")]
    EmptySessionId,
}

struct SessionEntry {
    orchestrator: Arc<Mutex<Orchestrator>>,
    last_used: u64,
}

#[derive(Default)]
struct SessionTable {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

impl SessionTable {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Least recently used session nobody else currently holds.
    fn idle_victim(&self) -> Option<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| Arc::strong_count(&entry.orchestrator) == 1)
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(session_id, _)| session_id.clone())
    }
}

/// Session id → orchestrator, created on first use and dropped on reset.
///
/// Each orchestrator sits behind its own `tokio::sync::Mutex`, so messages for
/// one session are processed one at a time in arrival order while different
/// sessions proceed independently.
pub struct SessionStore {
    llm: Arc<dyn LlmClient>,
    settings: OrchestratorSettings,
    registry_factory: RegistryFactory,
    max_sessions: Option<usize>,
    table: Mutex<SessionTable>,
}

impl SessionStore {
    pub fn builder(llm: Arc<dyn LlmClient>) -> SessionStoreBuilder {
        SessionStoreBuilder::new(llm)
    }

    /// Store wired with the default capabilities and the configured limits.
    pub fn from_config(config: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        SessionStoreBuilder::new(llm)
            .settings(OrchestratorSettings::from(config))
            .max_sessions(config.session.max_sessions)
            .build()
    }

    pub async fn get_or_create(
        &self,
        session_id: &str,
    ) -> Result<Arc<Mutex<Orchestrator>>, SessionError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(SessionError::EmptySessionId);
        }

        let mut table = self.table.lock().await;
        let now = table.tick();
        if let Some(entry) = table.entries.get_mut(session_id) {
            entry.last_used = now;
            return Ok(Arc::clone(&entry.orchestrator));
        }

        if let Some(limit) = self.max_sessions {
            if table.entries.len() >= limit {
                match table.idle_victim() {
                    Some(victim) => {
                        table.entries.remove(&victim);
                        info!(
                            event_name = "agent.session.evicted",
                            session_id = %victim,
                            limit,
                            "evicted least recently used session"
                        );
                    }
                    None => warn!(
                        event_name = "agent.session.over_capacity",
                        limit,
                        "every session is busy; exceeding session limit"
                    ),
                }
            }
        }

        let orchestrator = Orchestrator::new(
            Arc::clone(&self.llm),
            (self.registry_factory)(),
            self.settings.clone(),
        )
        .with_session_id(session_id);
        let orchestrator = Arc::new(Mutex::new(orchestrator));
        table.entries.insert(
            session_id.to_owned(),
            SessionEntry { orchestrator: Arc::clone(&orchestrator), last_used: now },
        );
        info!(event_name = "agent.session.created", session_id = %session_id, "session created");

        Ok(orchestrator)
    }

    /// Runs one message through the session's orchestrator, queueing behind
    /// any message already in flight for the same session.
    pub async fn process_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<AgentResponse, SessionError> {
        let orchestrator = self.get_or_create(session_id).await?;
        let mut orchestrator = orchestrator.lock().await;
        Ok(orchestrator.process_message(text).await)
    }

    /// Drops the session; the next message starts a fresh conversation.
    pub async fn reset(&self, session_id: &str) -> bool {
        let removed = self.table.lock().await.entries.remove(session_id.trim()).is_some();
        if removed {
            info!(event_name = "agent.session.reset", session_id = %session_id, "session dropped");
        }
        removed
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.table.lock().await.entries.contains_key(session_id.trim())
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn max_sessions(&self) -> Option<usize> {
        self.max_sessions
    }

    /// A registry as every new session receives it.
    pub fn registry_template(&self) -> CapabilityRegistry {
        let mut registry = (self.registry_factory)();
        registry.set_timeout(self.settings.capability_timeout);
        registry
    }
}

pub struct SessionStoreBuilder {
    llm: Arc<dyn LlmClient>,
    settings: OrchestratorSettings,
    registry_factory: RegistryFactory,
    max_sessions: Option<usize>,
}

impl SessionStoreBuilder {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            settings: OrchestratorSettings::default(),
            registry_factory: Arc::new(default_registry),
            max_sessions: None,
        }
    }

    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> CapabilityRegistry + Send + Sync + 'static,
    {
        self.registry_factory = Arc::new(factory);
        self
    }

    /// Zero leaves the store unbounded.
    pub fn max_sessions(mut self, limit: usize) -> Self {
        self.max_sessions = (limit > 0).then_some(limit);
        self
    }

    pub fn build(self) -> SessionStore {
        SessionStore {
            llm: self.llm,
            settings: self.settings,
            registry_factory: self.registry_factory,
            max_sessions: self.max_sessions,
            table: Mutex::new(SessionTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{SessionError, SessionStore};
    use crate::llm::ScriptedLlmClient;
    use crate::tools::CapabilityRegistry;

    fn store(client: Arc<ScriptedLlmClient>) -> SessionStore {
        SessionStore::builder(client).registry(CapabilityRegistry::new).build()
    }

    #[tokio::test]
    async fn sessions_are_created_on_first_message() {
        let client = Arc::new(ScriptedLlmClient::new([Ok("hi".to_owned())]));
        let store = store(client);

        assert!(store.is_empty().await);
        store.process_message("alice", "hello").await.unwrap();

        assert!(store.contains("alice").await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_keep_separate_histories() {
        let client = Arc::new(ScriptedLlmClient::new([
            Ok("answer for alice".to_owned()),
            Ok("answer for bob".to_owned()),
        ]));
        let store = store(client.clone());

        store.process_message("alice", "alice question").await.unwrap();
        store.process_message("bob", "bob question").await.unwrap();

        let prompts = client.prompts().await;
        assert!(!prompts[1].contains("alice question"));
        assert!(!prompts[1].contains("answer for alice"));
    }

    #[tokio::test]
    async fn blank_session_id_is_rejected() {
        let store = store(Arc::new(ScriptedLlmClient::default()));
        assert_eq!(store.process_message("  ", "hi").await, Err(SessionError::EmptySessionId));
    }

    #[tokio::test]
    async fn reset_drops_the_session() {
        let client = Arc::new(ScriptedLlmClient::new([
            Ok("first".to_owned()),
            Ok("second".to_owned()),
        ]));
        let store = store(client.clone());
        store.process_message("alice", "remember me").await.unwrap();

        assert!(store.reset("alice").await);
        assert!(!store.reset("alice").await);

        store.process_message("alice", "who am I?").await.unwrap();
        let prompts = client.prompts().await;
        assert!(!prompts[1].contains("remember me"));
    }

    #[tokio::test(start_paused = true)]
    async fn same_session_messages_are_serialized() {
        let client = Arc::new(
            ScriptedLlmClient::new([Ok("first answer".to_owned()), Ok("second answer".to_owned())])
                .with_latency(Duration::from_millis(50)),
        );
        let store = store(client.clone());

        let (first, second) = tokio::join!(
            store.process_message("alice", "first question"),
            store.process_message("alice", "second question"),
        );

        assert_eq!(first.unwrap().content, "first answer");
        assert_eq!(second.unwrap().content, "second answer");
        let prompts = client.prompts().await;
        assert!(prompts[1].contains("user: first question\nassistant: first answer"));
    }

    #[tokio::test]
    async fn least_recently_used_idle_session_is_evicted() {
        let client = Arc::new(ScriptedLlmClient::new(
            (0..4).map(|index| Ok(format!("answer {index}"))),
        ));
        let store = SessionStore::builder(client)
            .registry(CapabilityRegistry::new)
            .max_sessions(2)
            .build();

        store.process_message("a", "1").await.unwrap();
        store.process_message("b", "2").await.unwrap();
        store.process_message("a", "3").await.unwrap();
        store.process_message("c", "4").await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.contains("a").await);
        assert!(!store.contains("b").await);
        assert!(store.contains("c").await);
    }

    #[tokio::test]
    async fn busy_sessions_are_never_evicted() {
        let store = SessionStore::builder(Arc::new(ScriptedLlmClient::default()))
            .registry(CapabilityRegistry::new)
            .max_sessions(1)
            .build();

        let held = store.get_or_create("a").await.unwrap();
        store.get_or_create("b").await.unwrap();

        assert!(store.contains("a").await);
        assert_eq!(store.len().await, 2);
        drop(held);
    }
}
