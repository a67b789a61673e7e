pub mod chat;
pub mod config;
pub mod doctor;
pub mod tools;

use serde::Serialize;

/// Exit code and stdout text for one `scholar` subcommand.
///
/// `chat` reports a one-line JSON outcome through `success` and `failure`.
/// `doctor` and `tools` build their own output and fall back to `failure`
/// only when it cannot be rendered.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::CommandResult;

    #[test]
    fn failure_outcome_names_command_and_error_class() {
        let result = CommandResult::failure("chat", "completion_client", "no endpoint", 3);

        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");
        assert_eq!(result.exit_code, 3);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "completion_client");
        assert_eq!(payload["message"], "no endpoint");
    }

    #[test]
    fn success_outcome_has_no_error_class() {
        let result = CommandResult::success("chat", "session `cli` closed after 2 messages");

        let payload: Value = serde_json::from_str(&result.output).expect("json outcome");
        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
    }
}
