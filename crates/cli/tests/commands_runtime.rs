use std::env;
use std::sync::{Mutex, OnceLock};

use scholar_cli::commands::{config, doctor, tools};
use serde_json::Value;

#[test]
fn doctor_passes_with_default_local_provider() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected passing readiness report");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][1]["name"], "capability_registry");
        assert_eq!(payload["checks"][2]["name"], "completion_endpoint");
    });
}

#[test]
fn doctor_fails_when_hosted_provider_lacks_api_key() {
    with_env(&[("SCHOLAR_LLM_PROVIDER", "openai")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1, "expected failing readiness report");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert!(payload["checks"][0]["details"].as_str().unwrap_or_default().contains("llm.api_key"));
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_lists_checks() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] capability_registry: 5 capabilities"));
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_api_key() {
    with_env(
        &[
            ("SCHOLAR_LLM_PROVIDER", "anthropic"),
            ("SCHOLAR_LLM_API_KEY", "sk-ant-very-secret"),
            ("SCHOLAR_LOG_LEVEL", "debug"),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- llm.provider = anthropic (source: env (SCHOLAR_LLM_PROVIDER))"));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (SCHOLAR_LLM_API_KEY))"));
            assert!(output.contains("- logging.level = debug (source: env (SCHOLAR_LOG_LEVEL))"));
            assert!(output.contains("- llm.base_url = <unset> (using https://api.anthropic.com/v1)"));
            assert!(!output.contains("very-secret"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("SCHOLAR_AGENT_HISTORY_WINDOW", "0")], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed:"));
    });
}

#[test]
fn tools_lists_default_capabilities() {
    let result = tools::run();
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let names = payload
        .as_array()
        .expect("tool array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["compareTexts", "extractKeyPoints", "search", "searchNews", "summarize"]);
    assert_eq!(payload[4]["signature"], "summarize(text, style)");
    assert_eq!(payload[4]["input_schema"]["properties"]["style"]["default"], "brief");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SCHOLAR_LLM_PROVIDER",
        "SCHOLAR_LLM_API_KEY",
        "SCHOLAR_LLM_BASE_URL",
        "SCHOLAR_LLM_MODEL",
        "SCHOLAR_LLM_TIMEOUT_SECS",
        "SCHOLAR_LLM_MAX_TOKENS",
        "SCHOLAR_LLM_TEMPERATURE",
        "SCHOLAR_AGENT_HISTORY_WINDOW",
        "SCHOLAR_AGENT_CAPABILITY_TIMEOUT_SECS",
        "SCHOLAR_AGENT_SYSTEM_PROMPT",
        "SCHOLAR_SESSION_MAX_SESSIONS",
        "SCHOLAR_SERVER_BIND_ADDRESS",
        "SCHOLAR_SERVER_PORT",
        "SCHOLAR_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SCHOLAR_LOGGING_LEVEL",
        "SCHOLAR_LOGGING_FORMAT",
        "SCHOLAR_LOG_LEVEL",
        "SCHOLAR_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
