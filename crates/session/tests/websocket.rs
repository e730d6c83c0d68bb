#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Sessions over a real WebSocket against the mock service.

use std::{sync::Arc, time::Duration};

use {
    tokio::sync::mpsc,
    tryon_mock_service::{MockBehavior, MockOptions, SAMPLE_RESULT_BASE64, spawn_local},
    tryon_session::{
        FailureStage, ProcessingSession, SessionEvent, SessionOptions, SessionOutcome,
        SessionRequest, TransportFailure, WsConnector,
    },
};

const GARMENT: &str = "https://cdn.example/garment.jpg";

async fn run(behavior: MockBehavior) -> (SessionOutcome, Vec<SessionEvent>) {
    let (addr, _server) = spawn_local(MockOptions::default().with_behavior(behavior))
        .await
        .unwrap();
    let options = SessionOptions {
        service_url: format!("ws://{addr}"),
        ..SessionOptions::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session =
        ProcessingSession::new(SessionRequest::legacy(GARMENT), &options, Arc::new(WsConnector))
            .unwrap()
            .with_events(tx);
    let outcome = session.start().await.unwrap();
    drop(session);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (outcome, events)
}

#[tokio::test]
async fn round_trip_success() {
    let (outcome, events) = run(MockBehavior::Success).await;
    assert_eq!(outcome, SessionOutcome::Success {
        result_image: SAMPLE_RESULT_BASE64.into()
    });
    assert_eq!(events, vec![
        SessionEvent::Progress("Processing with default model...".into()),
        SessionEvent::Outcome(outcome),
    ]);
}

#[tokio::test]
async fn round_trip_server_error() {
    let (outcome, _) = run(MockBehavior::ServerError("bad garment".into())).await;
    assert_eq!(outcome, SessionOutcome::ServerError {
        message: "bad garment".into()
    });
}

#[tokio::test]
async fn dropped_connection_is_abnormal_close() {
    let (outcome, events) = run(MockBehavior::AbnormalClose).await;
    assert_eq!(
        outcome.transport_reason(),
        Some(TransportFailure::AbnormalClose)
    );
    assert_eq!(outcome.stage(), Some(FailureStage::Transport));
    assert!(matches!(events[0], SessionEvent::Progress(_)));
}

#[tokio::test]
async fn malformed_reply() {
    let (outcome, _) = run(MockBehavior::Malformed).await;
    assert_eq!(
        outcome.transport_reason(),
        Some(TransportFailure::MalformedMessage)
    );
}

#[tokio::test]
async fn nothing_listening_is_channel_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let options = SessionOptions {
        service_url: format!("ws://{addr}"),
        connect_timeout: Duration::from_secs(5),
        ..SessionOptions::default()
    };
    let mut session =
        ProcessingSession::new(SessionRequest::legacy(GARMENT), &options, Arc::new(WsConnector))
            .unwrap();
    let outcome = session.start().await.unwrap();
    assert_eq!(outcome.transport_reason(), Some(TransportFailure::ChannelError));
    assert_eq!(outcome.stage(), Some(FailureStage::Connect));
}
