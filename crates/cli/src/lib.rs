pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "scholar",
    about = "Scholar research assistant operator CLI",
    long_about = "Inspect configuration, check readiness, list capabilities, and chat with the research assistant.",
    after_help = "Examples:\n  scholar doctor --json\n  scholar config\n  scholar chat --session demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the capability registry, and the completion endpoint")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the default capabilities as JSON")]
    Tools,
    #[command(about = "Chat with the research assistant on stdin/stdout")]
    Chat {
        #[arg(long, default_value = "cli", help = "Session id to converse under")]
        session: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Tools => commands::tools::run(),
        Command::Chat { session } => commands::chat::run(&session),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn chat_session_defaults_to_cli() {
        let cli = Cli::try_parse_from(["scholar", "chat"]).expect("chat should parse");
        assert!(matches!(cli.command, Command::Chat { ref session } if session == "cli"));
    }

    #[test]
    fn doctor_accepts_json_flag() {
        let cli = Cli::try_parse_from(["scholar", "doctor", "--json"]).expect("doctor should parse");
        assert!(matches!(cli.command, Command::Doctor { json: true }));
    }
}
