use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blocks::MessageTemplate;
use crate::events::{
    ChannelEnvelope, ChannelEvent, EventContext, EventDispatcher, HandlerResult,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Bidirectional connection to a chat channel.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly.
    async fn next_envelope(&self) -> Result<Option<ChannelEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn send(
        &self,
        conversation_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChannelTransport;

#[async_trait]
impl ChannelTransport for NoopChannelTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChannelEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(
        &self,
        _conversation_id: &str,
        _message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct ChannelRunner {
    transport: Arc<dyn ChannelTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl ChannelRunner {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps envelopes until the stream closes or retries run out. Neither
    /// transport nor dispatch failures are returned to the caller.
    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "channel transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "channel retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening channel transport connection");
        self.transport.connect().await?;
        info!(attempt, "channel transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "channel transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let session_id = session_field(&envelope);

            info!(
                event_name = "ingress.channel.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                session_id = session_id.unwrap_or("unknown"),
                "received channel envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.channel.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge channel envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.channel.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged channel envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(HandlerResult::Responded(messages)) => {
                    self.deliver(&envelope, &messages).await;
                }
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        session_id = session_id.unwrap_or("unknown"),
                        error = %error,
                        "event dispatch failed; continuing channel loop"
                    );
                }
            }
        }
    }

    async fn deliver(&self, envelope: &ChannelEnvelope, messages: &[MessageTemplate]) {
        let Some(conversation_id) = envelope.event.conversation_id() else {
            return;
        };

        for message in messages {
            if let Err(error) = self.transport.send(conversation_id, message).await {
                warn!(
                    event_name = "egress.channel.send_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to deliver reply; skipping remaining messages"
                );
                return;
            }
        }
    }
}

fn session_field(envelope: &ChannelEnvelope) -> Option<&str> {
    match &envelope.event {
        ChannelEvent::Message(event) => Some(&event.user_id),
        ChannelEvent::MembersAdded(_) | ChannelEvent::Unsupported { .. } => None,
    }
}
