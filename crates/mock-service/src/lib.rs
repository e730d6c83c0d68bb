//! Mock processing service.
//!
//! Accepts WebSocket connections and answers each request the way the real
//! service does: a `status` frame, a pause, then a `processed_image` frame
//! carrying a 1x1 PNG. Other [`MockBehavior`]s script the failure modes a
//! client has to survive.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    futures::{SinkExt, StreamExt},
    tokio::{
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    },
    tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message},
    tracing::{debug, info, warn},
    tryon_protocol::{ClientMessage, ProcessedImage, ServerMessage},
};

/// Base64 of a 1x1 PNG, returned as the processed image.
pub const SAMPLE_RESULT_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// What the service does after the `status` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MockBehavior {
    #[default]
    Success,
    /// Answer with an `error` frame.
    ServerError(String),
    /// Drop the TCP connection without a close handshake.
    AbnormalClose,
    /// Send a frame that is not JSON.
    Malformed,
    /// Read the request and never answer.
    Silent,
}

#[derive(Debug, Clone)]
pub struct MockOptions {
    pub behavior: MockBehavior,
    /// Pause between the status frame and the terminal frame.
    pub delay: Duration,
    pub result_base64: String,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            behavior: MockBehavior::Success,
            delay: Duration::ZERO,
            result_base64: SAMPLE_RESULT_BASE64.to_string(),
        }
    }
}

impl MockOptions {
    #[must_use]
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Serve connections from `listener` until the task is dropped.
pub async fn serve(listener: TcpListener, options: MockOptions) -> anyhow::Result<()> {
    let options = Arc::new(options);
    info!(addr = %listener.local_addr()?, behavior = ?options.behavior, "mock service listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let options = Arc::clone(&options);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, &options).await {
                warn!(%peer, error = %e, "mock connection failed");
            }
        });
    }
}

/// Bind an ephemeral localhost port and serve on it in the background.
pub async fn spawn_local(options: MockOptions) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, options).await {
            warn!(error = %e, "mock service stopped");
        }
    });
    Ok((addr, handle))
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    options: &MockOptions,
) -> anyhow::Result<()> {
    let mut ws = accept_async(stream).await?;
    debug!(%peer, "client connected");

    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => {
                let request = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(%peer, error = %e, "unreadable request");
                        send(&mut ws, &ServerMessage::error(format!("invalid request: {e}")))
                            .await?;
                        continue;
                    },
                };
                if !answer(&mut ws, &request, options).await? {
                    return Ok(());
                }
            },
            Message::Ping(data) => ws.send(Message::Pong(data)).await?,
            Message::Close(_) => break,
            _ => {},
        }
    }
    debug!(%peer, "client disconnected");
    Ok(())
}

/// Reply to one request. Returns `false` when the connection must be dropped.
async fn answer(
    ws: &mut WebSocketStream<TcpStream>,
    request: &ClientMessage,
    options: &MockOptions,
) -> anyhow::Result<bool> {
    info!(
        kind = request.kind(),
        garment_url = request.garment_url(),
        "request received"
    );
    let status = match request {
        ClientMessage::Image { .. } => "Processing with default model...",
        ClientMessage::ProcessViton {
            model_image_base64, ..
        } => {
            debug!(model_bytes = model_image_base64.len(), "custom request");
            "Processing images..."
        },
    };

    if options.behavior == MockBehavior::Silent {
        return Ok(true);
    }
    send(ws, &ServerMessage::status(status)).await?;
    if !options.delay.is_zero() {
        tokio::time::sleep(options.delay).await;
    }

    match &options.behavior {
        MockBehavior::Success => {
            let result = ServerMessage::ProcessedImage(ProcessedImage {
                image_base64: Some(options.result_base64.clone()),
                image_url: None,
                message: Some("Processing completed".into()),
            });
            send(ws, &result).await?;
        },
        MockBehavior::ServerError(message) => send(ws, &ServerMessage::error(message)).await?,
        MockBehavior::Malformed => ws.send(Message::Text("not json".to_string().into())).await?,
        MockBehavior::AbnormalClose => {
            debug!("dropping connection without close frame");
            return Ok(false);
        },
        MockBehavior::Silent => {},
    }
    Ok(true)
}

async fn send(ws: &mut WebSocketStream<TcpStream>, message: &ServerMessage) -> anyhow::Result<()> {
    debug!(terminal = message.is_terminal(), "sending frame");
    ws.send(Message::Text(message.to_json()?.into())).await?;
    Ok(())
}
