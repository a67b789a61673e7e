/// Control tokens intercepted before a message reaches the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Drop the session; the next message starts a fresh conversation.
    Clear,
    Help,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "/clear",
            Self::Help => "/help",
        }
    }
}

/// Matches the whole message, trimmed and case-insensitive.
pub fn parse_control_command(text: &str) -> Option<ControlCommand> {
    let normalized = text.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "/clear" => Some(ControlCommand::Clear),
        "/help" => Some(ControlCommand::Help),
        _ => None,
    }
}
