use scholar_agent::{AgentResponse, Citation};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), value: None }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// One outgoing message: plain fallback text plus typed blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Single-section message carrying `text` verbatim.
    pub fn text(block_id: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        MessageBuilder::new(text.clone())
            .section(block_id, |section| {
                section.mrkdwn(text);
            })
            .build()
    }

    /// Block texts joined by blank lines, for surfaces without block rendering.
    pub fn plain_text(&self) -> String {
        let parts = self
            .blocks
            .iter()
            .flat_map(|block| match block {
                Block::Header { text, .. } | Block::Section { text, .. } => vec![text.text()],
                Block::Context { elements, .. } => elements.iter().map(TextObject::text).collect(),
                Block::Actions { .. } => Vec::new(),
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();

        if parts.is_empty() {
            self.fallback_text.clone()
        } else {
            parts.join("\n\n")
        }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub const SESSION_CLEARED_TEXT: &str = "Session cleared. Starting fresh!";
pub const CHANNEL_APOLOGY_TEXT: &str =
    "I apologize, but I encountered an error. Please try again.";

/// Messages for one answer: the content, then a sources card and an
/// activity line when there is something to show.
pub fn response_messages(response: &AgentResponse) -> Vec<MessageTemplate> {
    let mut messages = vec![MessageTemplate::text("assistant.answer.v1", response.content.clone())];
    if !response.citations.is_empty() {
        messages.push(sources_card(&response.citations));
    }
    if !response.functions_invoked.is_empty() {
        messages.push(activity_summary(&response.functions_invoked));
    }
    messages
}

pub fn sources_card(citations: &[Citation]) -> MessageTemplate {
    let list = citations
        .iter()
        .enumerate()
        .map(|(index, citation)| format!("{}. {}", index + 1, citation.source))
        .collect::<Vec<_>>()
        .join("\n");

    MessageBuilder::new(format!("📚 Sources\n{list}"))
        .header("assistant.sources.header.v1", "📚 Sources")
        .section("assistant.sources.list.v1", |section| {
            section.plain(list.clone());
        })
        .build()
}

pub fn activity_summary(functions_invoked: &[String]) -> MessageTemplate {
    MessageTemplate::text(
        "assistant.activity.v1",
        format!("📊 *Research activity:* {}", functions_invoked.join(", ")),
    )
}

pub fn session_cleared_message() -> MessageTemplate {
    MessageTemplate::text("assistant.session.cleared.v1", SESSION_CLEARED_TEXT)
}

pub fn apology_message(correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(CHANNEL_APOLOGY_TEXT)
        .section("assistant.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {CHANNEL_APOLOGY_TEXT}"));
        })
        .context("assistant.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Research Assistant help")
        .header("assistant.help.header.v1", "📖 Research Assistant Help")
        .section("assistant.help.commands.v1", |section| {
            section.mrkdwn(
                "*Commands:*\n• `/clear` - Start a new session\n• `/help` - Show this help message",
            );
        })
        .section("assistant.help.examples.v1", |section| {
            section.mrkdwn(
                "*Example Questions:*\n• 'What is quantum computing?'\n• 'Research renewable energy trends'\n• 'Compare machine learning frameworks'\n• 'Summarize the history of the internet'",
            );
        })
        .section("assistant.help.tips.v1", |section| {
            section.mrkdwn(
                "*Tips:*\n• Be specific with your questions\n• Ask follow-up questions for deeper insights\n• Request summaries or bullet points if needed",
            );
        })
        .build()
}

pub fn welcome_message() -> MessageTemplate {
    MessageBuilder::new("Welcome to the Research Assistant")
        .header("assistant.welcome.header.v1", "🔬 Research Assistant")
        .section("assistant.welcome.capabilities.v1", |section| {
            section.mrkdwn(
                "I'm your AI-powered research assistant. I can help you:\n🔍 Search and find information\n📝 Summarize complex topics\n📊 Analyze and compare sources\n📚 Track citations and references",
            );
        })
        .section("assistant.welcome.examples.v1", |section| {
            section.mrkdwn(
                "Just ask me anything! For example:\n• 'Research the latest AI developments'\n• 'Summarize climate change impacts'\n• 'Compare different energy sources'",
            );
        })
        .actions("assistant.welcome.actions.v1", |actions| {
            actions
                .button(ButtonElement::new("assistant.start.v1", "Start Researching").value("startResearch"))
                .button(ButtonElement::new("assistant.help.v1", "Help").value("help"));
        })
        .build()
}

#[cfg(test)]
mod tests {
    use scholar_agent::{AgentResponse, Citation};

    use super::{
        activity_summary, apology_message, help_message, response_messages, sources_card,
        welcome_message, Block, MessageBuilder, TextObject, CHANNEL_APOLOGY_TEXT,
    };

    fn citation(source: &str) -> Citation {
        Citation { source: source.to_owned(), context: String::new() }
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("answer.header.v1", "Answer")
            .section("answer.body.v1", |section| {
                section.mrkdwn("*Findings*");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[1],
            Block::Section { block_id, text: TextObject::Mrkdwn { .. } } if block_id == "answer.body.v1"
        ));
    }

    #[test]
    fn plain_text_flattens_help_card() {
        let text = help_message().plain_text();

        assert!(text.starts_with("📖 Research Assistant Help\n\n*Commands:*"));
        assert!(text.contains("`/clear` - Start a new session"));
        assert!(text.contains("*Example Questions:*"));
    }

    #[test]
    fn plain_answer_renders_single_message() {
        let response = AgentResponse {
            content: "Direct answer".to_owned(),
            citations: Vec::new(),
            functions_invoked: Vec::new(),
        };

        let messages = response_messages(&response);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].fallback_text, "Direct answer");
    }

    #[test]
    fn answer_with_citations_and_calls_renders_three_messages() {
        let response = AgentResponse {
            content: "AI is growing [Source: AI Encyclopedia]".to_owned(),
            citations: vec![citation("AI Encyclopedia")],
            functions_invoked: vec!["search".to_owned(), "summarize".to_owned()],
        };

        let messages = response_messages(&response);

        assert_eq!(messages.len(), 3);
        assert!(messages[1].fallback_text.starts_with("📚 Sources"));
        assert_eq!(messages[2].fallback_text, "📊 *Research activity:* search, summarize");
    }

    #[test]
    fn sources_card_numbers_every_citation() {
        let card = sources_card(&[citation("A"), citation("B"), citation("A")]);

        let list = card.blocks.iter().find_map(|block| match block {
            Block::Section { text, .. } => Some(text.text().to_owned()),
            _ => None,
        });
        assert_eq!(list.as_deref(), Some("1. A\n2. B\n3. A"));
    }

    #[test]
    fn activity_summary_joins_names_in_order() {
        let message = activity_summary(&["search".to_owned(), "searchNews".to_owned()]);
        assert!(message.fallback_text.ends_with("search, searchNews"));
    }

    #[test]
    fn apology_template_contains_correlation_id() {
        let message = apology_message("req-123");

        assert_eq!(message.fallback_text, CHANNEL_APOLOGY_TEXT);
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. } if elements[0].text().contains("req-123")
        ));
    }

    #[test]
    fn help_and_welcome_mention_commands() {
        let help = serde_json::to_string(&help_message()).unwrap_or_default();
        assert!(help.contains("/clear"));
        assert!(help.contains("/help"));

        let welcome = welcome_message();
        assert!(welcome.blocks.iter().any(|block| matches!(block, Block::Actions { .. })));
    }
}
