use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use scholar_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config, detect_config_path().as_deref()),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// Effective values, one line per key, with the layer each value came from.
pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let base_url = match &config.llm.base_url {
        Some(base_url) => base_url.clone(),
        None => format!("<unset> (using {})", config.llm.endpoint()),
    };
    let system_prompt = if config.agent.system_prompt.is_some() { "<custom>" } else { "<built-in>" };
    let max_sessions = match config.session.max_sessions {
        0 => "unbounded".to_string(),
        limit => limit.to_string(),
    };

    let fields: [(&str, String, &[&str]); 15] = [
        ("llm.provider", config.llm.provider.as_str().to_string(), &["SCHOLAR_LLM_PROVIDER"]),
        ("llm.model", config.llm.model.clone(), &["SCHOLAR_LLM_MODEL"]),
        ("llm.base_url", base_url, &["SCHOLAR_LLM_BASE_URL"]),
        ("llm.api_key", api_key, &["SCHOLAR_LLM_API_KEY"]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["SCHOLAR_LLM_TIMEOUT_SECS"]),
        ("llm.max_tokens", config.llm.max_tokens.to_string(), &["SCHOLAR_LLM_MAX_TOKENS"]),
        ("llm.temperature", config.llm.temperature.to_string(), &["SCHOLAR_LLM_TEMPERATURE"]),
        (
            "agent.history_window",
            config.agent.history_window.to_string(),
            &["SCHOLAR_AGENT_HISTORY_WINDOW"],
        ),
        (
            "agent.capability_timeout_secs",
            config.agent.capability_timeout_secs.to_string(),
            &["SCHOLAR_AGENT_CAPABILITY_TIMEOUT_SECS"],
        ),
        ("agent.system_prompt", system_prompt.to_string(), &["SCHOLAR_AGENT_SYSTEM_PROMPT"]),
        ("session.max_sessions", max_sessions, &["SCHOLAR_SESSION_MAX_SESSIONS"]),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["SCHOLAR_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["SCHOLAR_SERVER_PORT"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["SCHOLAR_LOGGING_LEVEL", "SCHOLAR_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["SCHOLAR_LOGGING_FORMAT", "SCHOLAR_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source = field_source(key, env_keys, config_file_doc.as_ref(), config_file_path);
        lines.push(format!("- {key} = {value} (source: {source})"));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("scholar.toml"), PathBuf::from("config/scholar.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a dash-delimited prefix such as `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use scholar_core::config::AppConfig;
    use secrecy::SecretString;
    use tempfile::TempDir;

    use super::{redact_secret, render};

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_secret("plainsecret"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }

    #[test]
    fn render_hides_api_key_and_explains_endpoint_fallback() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some(SecretString::from("sk-secret-value".to_string()));

        let output = render(&config, None);

        assert!(output.contains("- llm.api_key = sk-***"));
        assert!(!output.contains("secret-value"));
        assert!(output.contains("- llm.base_url = <unset> (using http://localhost:11434)"));
        assert!(output.contains("- session.max_sessions = unbounded"));
    }

    #[test]
    fn keys_present_in_file_are_attributed_to_it() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("scholar.toml");
        fs::write(&path, "[llm]\nmodel = \"mistral\"\n").expect("write config");

        let output = render(&AppConfig::default(), Some(&path));

        assert!(output.contains(&format!("- llm.model = llama3.1 (source: file ({}))", path.display())));
        assert!(output.contains("- server.port = 3978 (source: default)"));
    }
}
