use std::sync::Arc;

use axum::Router;
use scholar_agent::{client_from_config, CompletionError, LlmClient, SessionStore};
use scholar_channel::{default_dispatcher, ChannelRunner, NoopChannelTransport, ReconnectPolicy};
use scholar_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub channel_runner: ChannelRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("completion client setup failed: {0}")]
    Completion(#[from] CompletionError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let llm = client_from_config(&config.llm)?;
    info!(
        event_name = "system.bootstrap.llm_client_ready",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        endpoint = config.llm.endpoint(),
        model = %config.llm.model,
        "completion client configured"
    );
    Ok(bootstrap_with_client(config, llm))
}

/// Wires sessions and the channel runner around an already built client.
pub fn bootstrap_with_client(config: AppConfig, llm: Arc<dyn LlmClient>) -> Application {
    let sessions = Arc::new(SessionStore::from_config(&config, llm));
    let channel_runner = ChannelRunner::new(
        Arc::new(NoopChannelTransport),
        default_dispatcher(Arc::clone(&sessions)),
        ReconnectPolicy::default(),
    );

    Application { config, sessions, channel_runner }
}

impl Application {
    /// Message API, tool facade and health probe on one router.
    pub fn router(&self) -> Router {
        api::router(Arc::clone(&self.sessions)).merge(health::router(
            Arc::clone(&self.sessions),
            self.config.llm.provider,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scholar_agent::ScriptedLlmClient;
    use scholar_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::{bootstrap, bootstrap_with_client, BootstrapError};

    #[test]
    fn bootstrap_fails_fast_without_api_key_for_hosted_provider() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                llm_api_key: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let error = result.err().expect("bootstrap should reject blank api key");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("llm.api_key"));
    }

    #[tokio::test]
    async fn bootstrap_applies_session_limits_from_config() {
        let mut config = AppConfig::default();
        config.session.max_sessions = 3;
        config.agent.history_window = 4;

        let app = bootstrap_with_client(config, Arc::new(ScriptedLlmClient::default()));

        assert_eq!(app.sessions.max_sessions(), Some(3));
        assert_eq!(app.sessions.settings().history_window, 4);
        assert!(app.sessions.is_empty().await);
        assert_eq!(app.sessions.registry_template().len(), 5);
    }

    #[tokio::test]
    async fn channel_runner_stops_cleanly_on_noop_transport() {
        let app = bootstrap_with_client(AppConfig::default(), Arc::new(ScriptedLlmClient::default()));
        app.channel_runner.start().await.expect("noop transport closes without error");
    }
}
