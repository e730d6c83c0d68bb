//! The transport seam between a session and the processing service.

use async_trait::async_trait;

use crate::error::ChannelError;

/// Inbound traffic and lifecycle events of an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(String),
    Error(String),
    /// `code` is `None` when the peer went away without a close frame.
    Closed { code: Option<u16>, reason: String },
}

/// An open, message-framed, bidirectional channel.
///
/// After `recv` yields `Closed` or `Error` the channel is finished.
#[async_trait]
pub trait Channel: Send {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Next inbound event. Must be cancel safe.
    async fn recv(&mut self) -> ChannelEvent;

    /// Close from our side. Idempotent.
    async fn close(&mut self);
}

/// Opens channels to a service endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Channel>, ChannelError>;
}
