//! Scripted in-process channel for driving sessions without a network.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::sync::mpsc,
    tryon_session::{Channel, ChannelError, ChannelEvent, Connector},
};

/// How the fake connector answers a connect attempt.
#[derive(Debug, Clone)]
pub enum ConnectPlan {
    Immediate,
    After(Duration),
    Never,
    Fail(String),
}

/// Test-side view of the fake service.
pub struct FakeService {
    pub inbound: mpsc::UnboundedSender<ChannelEvent>,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closes: Arc<AtomicUsize>,
    pub connects: Arc<AtomicUsize>,
}

impl FakeService {
    pub fn push(&self, event: ChannelEvent) {
        self.inbound.send(event).unwrap();
    }

    pub fn push_text(&self, text: &str) {
        self.push(ChannelEvent::Message(text.to_string()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub struct FakeConnector {
    plan: ConnectPlan,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

pub fn fake(plan: ConnectPlan) -> (Arc<FakeConnector>, FakeService) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let closes = Arc::new(AtomicUsize::new(0));
    let connects = Arc::new(AtomicUsize::new(0));
    let connector = FakeConnector {
        plan,
        inbound: Mutex::new(Some(rx)),
        sent: Arc::clone(&sent),
        closes: Arc::clone(&closes),
        connects: Arc::clone(&connects),
    };
    (Arc::new(connector), FakeService {
        inbound: tx,
        sent,
        closes,
        connects,
    })
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Channel>, ChannelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.plan {
            ConnectPlan::Immediate => {},
            ConnectPlan::After(delay) => tokio::time::sleep(*delay).await,
            ConnectPlan::Never => std::future::pending::<()>().await,
            ConnectPlan::Fail(reason) => return Err(ChannelError::Connect(reason.clone())),
        }
        let inbound = self
            .inbound
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChannelError::Connect("fake connector reused".into()))?;
        Ok(Box::new(FakeChannel {
            inbound,
            sent: Arc::clone(&self.sent),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct FakeChannel {
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Channel for FakeChannel {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> ChannelEvent {
        match self.inbound.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Drain everything the session reported.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
