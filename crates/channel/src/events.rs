use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use scholar_agent::{AgentResponse, SessionStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    blocks::{self, MessageTemplate},
    commands::{parse_control_command, ControlCommand},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEnvelope {
    pub envelope_id: String,
    pub event: ChannelEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(MessageEvent),
    MembersAdded(MembersAddedEvent),
    Unsupported { event_type: String },
}

impl ChannelEvent {
    pub fn event_type(&self) -> ChannelEventType {
        match self {
            Self::Message(_) => ChannelEventType::Message,
            Self::MembersAdded(_) => ChannelEventType::MembersAdded,
            Self::Unsupported { .. } => ChannelEventType::Unsupported,
        }
    }

    /// Conversation replies for this event are posted to.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::Message(event) => Some(&event.conversation_id),
            Self::MembersAdded(event) => Some(&event.conversation_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChannelEventType {
    Message,
    MembersAdded,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub conversation_id: String,
    /// Sessions are keyed by the sending user.
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembersAddedEvent {
    pub conversation_id: String,
    pub member_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<MessageTemplate>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("assistant service failure: {0}")]
    Assistant(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChannelEventType;
    async fn handle(
        &self,
        envelope: &ChannelEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChannelEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChannelEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with the message and welcome handlers wired to `service`.
pub fn default_dispatcher<S>(service: S) -> EventDispatcher
where
    S: AssistantService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service));
    dispatcher.register(MembersAddedHandler);
    dispatcher
}

/// What the channel needs from the agent side.
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn respond(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<AgentResponse, EventHandlerError>;

    /// Returns whether a session existed.
    async fn reset(&self, session_id: &str) -> bool;
}

#[async_trait]
impl AssistantService for SessionStore {
    async fn respond(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<AgentResponse, EventHandlerError> {
        self.process_message(session_id, text)
            .await
            .map_err(|error| EventHandlerError::Assistant(error.to_string()))
    }

    async fn reset(&self, session_id: &str) -> bool {
        SessionStore::reset(self, session_id).await
    }
}

#[async_trait]
impl<S> AssistantService for Arc<S>
where
    S: AssistantService + ?Sized,
{
    async fn respond(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<AgentResponse, EventHandlerError> {
        (**self).respond(session_id, text).await
    }

    async fn reset(&self, session_id: &str) -> bool {
        (**self).reset(session_id).await
    }
}

/// Handles user messages: control commands first, everything else goes to
/// the assistant. Service failures are rendered as an apology, never raised.
pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: AssistantService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> HandlerResult {
        let text = event.text.trim();
        if text.is_empty() {
            return HandlerResult::Processed;
        }

        if let Some(command) = parse_control_command(text) {
            info!(
                event_name = "channel.command.received",
                correlation_id = %ctx.correlation_id,
                session_id = %event.user_id,
                command = command.as_str(),
                "control command intercepted"
            );
            let message = match command {
                ControlCommand::Clear => {
                    self.service.reset(&event.user_id).await;
                    blocks::session_cleared_message()
                }
                ControlCommand::Help => blocks::help_message(),
            };
            return HandlerResult::Responded(vec![message]);
        }

        match self.service.respond(&event.user_id, text).await {
            Ok(response) => HandlerResult::Responded(blocks::response_messages(&response)),
            Err(error) => {
                warn!(
                    event_name = "channel.message.failed",
                    correlation_id = %ctx.correlation_id,
                    session_id = %event.user_id,
                    error = %error,
                    "assistant failed; sending apology"
                );
                HandlerResult::Responded(vec![blocks::apology_message(&ctx.correlation_id)])
            }
        }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: AssistantService + 'static,
{
    fn event_type(&self) -> ChannelEventType {
        ChannelEventType::Message
    }

    async fn handle(
        &self,
        envelope: &ChannelEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChannelEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(self.handle_message(event, ctx).await)
    }
}

pub struct MembersAddedHandler;

#[async_trait]
impl EventHandler for MembersAddedHandler {
    fn event_type(&self) -> ChannelEventType {
        ChannelEventType::MembersAdded
    }

    async fn handle(
        &self,
        envelope: &ChannelEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChannelEvent::MembersAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.member_ids.is_empty() {
            return Ok(HandlerResult::Processed);
        }

        Ok(HandlerResult::Responded(vec![blocks::welcome_message()]))
    }
}
