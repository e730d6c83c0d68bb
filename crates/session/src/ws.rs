use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    tokio::net::TcpStream,
    tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream, connect_async,
        tungstenite::{self, Message, error::ProtocolError},
    },
    tracing::{debug, info},
    tryon_protocol::close_codes,
};

use crate::{
    channel::{Channel, ChannelEvent, Connector},
    error::ChannelError,
};

/// Opens plain WebSocket channels with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Channel>, ChannelError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        info!(url, status = response.status().as_u16(), "channel open");
        Ok(Box::new(WsChannel::new(stream)))
    }
}

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsChannel {
    pub fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    fn peer_gone(&mut self) -> ChannelEvent {
        self.closed = true;
        ChannelEvent::Closed {
            code: Some(close_codes::ABNORMAL),
            reason: String::new(),
        }
    }
}

#[async_trait]
impl Channel for WsChannel {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        debug!(bytes = text.len(), "sending frame");
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> ChannelEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return ChannelEvent::Message(text.to_string()),
                Some(Ok(Message::Binary(data))) => {
                    return ChannelEvent::Message(String::from_utf8_lossy(&data).into_owned());
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return ChannelEvent::Error(e.to_string());
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    debug!(?code, "peer closed channel");
                    return ChannelEvent::Closed { code, reason };
                },
                Some(Ok(_)) => {},
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed
                    | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake),
                ))
                | None => return self.peer_gone(),
                Some(Err(e)) => return ChannelEvent::Error(e.to_string()),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}
