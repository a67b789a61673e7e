use anyhow::Result;
use scholar_agent::{client_from_config, SessionStore};
use scholar_channel::{
    blocks::{help_message, response_messages, SESSION_CLEARED_TEXT},
    parse_control_command, ControlCommand,
};
use scholar_core::config::{AppConfig, LoadOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::commands::CommandResult;

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub messages: usize,
    pub resets: usize,
}

pub fn run(session_id: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let llm = match client_from_config(&config.llm) {
        Ok(llm) => llm,
        Err(error) => {
            return CommandResult::failure("chat", "completion_client", error.to_string(), 3);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let store = SessionStore::from_config(&config, llm);
    let result = runtime.block_on(async {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        converse(&store, session_id, stdin, &mut stdout).await
    });

    match result {
        Ok(summary) => CommandResult::success(
            "chat",
            format!("session `{session_id}` closed after {} messages", summary.messages),
        ),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 4),
    }
}

/// Reads one message per line until EOF or `/quit`, writing each answer as
/// plain text.
pub async fn converse<R, W>(
    store: &SessionStore,
    session_id: &str,
    input: R,
    output: &mut W,
) -> Result<ChatSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = ChatSummary::default();
    let mut lines = input.lines();

    output.write_all(b"Research Assistant ready. Type /help for commands, /quit to leave.\n").await?;
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.iter().any(|command| text.eq_ignore_ascii_case(command)) {
            break;
        }

        let reply = match parse_control_command(text) {
            Some(ControlCommand::Clear) => {
                store.reset(session_id).await;
                summary.resets += 1;
                SESSION_CLEARED_TEXT.to_string()
            }
            Some(ControlCommand::Help) => help_message().plain_text(),
            None => {
                summary.messages += 1;
                let response = store.process_message(session_id, text).await?;
                response_messages(&response)
                    .iter()
                    .map(|message| message.plain_text())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
        };

        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n\n").await?;
    }

    output.flush().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scholar_agent::{CapabilityRegistry, ScriptedLlmClient, SessionStore};

    use super::{converse, ChatSummary};

    #[tokio::test]
    async fn commands_are_handled_locally_and_quit_stops_reading() {
        let client = Arc::new(ScriptedLlmClient::new([Ok("First answer.".to_string())]));
        let store = SessionStore::builder(client.clone()).registry(CapabilityRegistry::new).build();
        let input: &[u8] = b"hello\n\n/help\n/clear\n/quit\nnever read\n";
        let mut output = Vec::new();

        let summary = converse(&store, "cli", input, &mut output).await.expect("chat loop");

        let transcript = String::from_utf8(output).expect("utf8 transcript");
        assert_eq!(summary, ChatSummary { messages: 1, resets: 1 });
        assert!(transcript.contains("First answer."));
        assert!(transcript.contains("Research Assistant Help"));
        assert!(transcript.contains("Session cleared. Starting fresh!"));
        assert_eq!(client.prompts().await.len(), 1);
        assert!(!store.contains("cli").await);
    }

    #[tokio::test]
    async fn answers_include_sources_and_activity() {
        let client = Arc::new(ScriptedLlmClient::new([
            Ok("<call name=\"search\">{\"query\": \"artificial intelligence\"}</call>".to_string()),
            Ok("AI keeps advancing [Source: AI Encyclopedia].".to_string()),
        ]));
        let store = SessionStore::builder(client).build();
        let input: &[u8] = b"Research AI\n";
        let mut output = Vec::new();

        converse(&store, "cli", input, &mut output).await.expect("chat loop");

        let transcript = String::from_utf8(output).expect("utf8 transcript");
        assert!(transcript.contains("AI keeps advancing"));
        assert!(transcript.contains("1. AI Encyclopedia"));
        assert!(transcript.contains("Research activity:* search"));
    }
}
