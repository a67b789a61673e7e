//! Channel shell - delivers user messages to the research assistant and
//! renders its answers
//!
//! - **Events** (`events`) - envelopes, dispatcher, message/welcome handlers
//! - **Commands** (`commands`) - `/clear` and `/help`, handled before the agent sees the text
//! - **Blocks** (`blocks`) - typed message templates (answer, sources card, activity line)
//! - **Socket** (`socket`) - transport loop with reconnection logic
//!
//! # Architecture
//!
//! ```text
//! Transport → ChannelRunner → EventDispatcher → MessageHandler → SessionStore
//!                 ↑                                   ↓
//!                 └────────── MessageTemplate ← AgentResponse
//! ```
//!
//! # Key Types
//!
//! - `ChannelRunner` - envelope pump with reconnect backoff
//! - `EventDispatcher` - routes events by type
//! - `AssistantService` - what the handlers need from the agent (implemented for `SessionStore`)
//! - `MessageBuilder` - constructs block messages

pub mod blocks;
pub mod commands;
pub mod events;
pub mod socket;

pub use blocks::{Block, MessageBuilder, MessageTemplate, TextObject};
pub use commands::{parse_control_command, ControlCommand};
pub use events::{
    default_dispatcher, AssistantService, ChannelEnvelope, ChannelEvent, ChannelEventType,
    DispatchError, EventContext, EventDispatcher, EventHandler, EventHandlerError, HandlerResult,
    MembersAddedEvent, MembersAddedHandler, MessageEvent, MessageHandler,
};
pub use socket::{
    ChannelRunner, ChannelTransport, NoopChannelTransport, ReconnectPolicy, TransportError,
};
