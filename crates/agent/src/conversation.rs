use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Ordered turn history for one session.
///
/// The first turn is always the single system turn. Turns are only ever
/// appended; `reset` starts a fresh history from a new system turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let mut state = Self { turns: Vec::new() };
        state.append_system(system_prompt);
        state
    }

    fn append_system(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::System, text));
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::Assistant, text));
    }

    /// The most recent `k` turns, oldest first.
    pub fn recent_suffix(&self, k: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(k);
        &self.turns[start..]
    }

    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.turns.clear();
        self.append_system(system_prompt);
    }

    pub fn system_prompt(&self) -> &str {
        self.turns.first().map(|turn| turn.content.as_str()).unwrap_or_default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConversationState, Role};

    #[test]
    fn starts_with_exactly_one_system_turn() {
        let state = ConversationState::new("be helpful");
        assert_eq!(state.len(), 1);
        assert_eq!(state.turns()[0].role, Role::System);
        assert_eq!(state.system_prompt(), "be helpful");
    }

    #[test]
    fn appends_preserve_insertion_order() {
        let mut state = ConversationState::new("sys");
        state.append_user("first question");
        state.append_assistant("first answer");
        state.append_user("second question");

        let roles = state.turns().iter().map(|turn| turn.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(state.turns()[3].content, "second question");
    }

    #[test]
    fn recent_suffix_is_bounded_and_keeps_latest_turns() {
        let mut state = ConversationState::new("sys");
        for index in 0..30 {
            state.append_user(format!("question {index}"));
            state.append_assistant(format!("answer {index}"));
        }

        let suffix = state.recent_suffix(10);
        assert_eq!(suffix.len(), 10);
        assert_eq!(suffix[9].content, "answer 29");
        assert_eq!(suffix[0].content, "question 25");
    }

    #[test]
    fn recent_suffix_returns_everything_for_short_histories() {
        let mut state = ConversationState::new("sys");
        state.append_user("only question");

        assert_eq!(state.recent_suffix(10).len(), 2);
        assert!(state.recent_suffix(0).is_empty());
    }

    #[test]
    fn reset_keeps_only_the_fresh_system_turn() {
        let mut state = ConversationState::new("old rules");
        state.append_user("hello");
        state.append_assistant("hi");

        state.reset("new rules");

        assert_eq!(state.len(), 1);
        assert_eq!(state.system_prompt(), "new rules");
    }
}
