use std::{collections::VecDeque, future::Future, pin::Pin, sync::Arc, time::Duration};

use {
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{Instrument, debug, info, info_span, warn},
    tryon_common::{Clock, SystemClock},
    tryon_config::TryonConfig,
    tryon_protocol::{CONNECT_TIMEOUT_MS, DEFAULT_SERVICE_URL, REFERENCE_TTL_MS},
};

use crate::{
    channel::{Channel, ChannelEvent, Connector},
    error::{ChannelError, RequestError, SessionError},
    machine::{Effect, Input, Phase, SessionMachine},
    outcome::{SessionEvent, SessionOutcome},
    request::SessionRequest,
    timer::ConnectTimer,
};

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Box<dyn Channel>, ChannelError>> + Send>>;

/// Knobs shared by every session a process runs.
#[derive(Clone)]
pub struct SessionOptions {
    pub service_url: String,
    pub connect_timeout: Duration,
    /// Used to reject composite requests whose reference image has expired.
    pub reference_ttl: Duration,
    pub clock: Arc<dyn Clock>,
}

impl SessionOptions {
    pub fn from_config(config: &TryonConfig) -> Self {
        Self {
            service_url: config.service.url.clone(),
            connect_timeout: config.service.connect_timeout(),
            reference_ttl: config.cache.ttl(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            reference_ttl: Duration::from_millis(REFERENCE_TTL_MS),
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("service_url", &self.service_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("reference_ttl", &self.reference_ttl)
            .finish_non_exhaustive()
    }
}

/// Cancels a running session from another task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Release the channel and timer without producing an outcome.
    pub fn abandon(&self) {
        self.cancel.cancel();
    }

    pub fn is_abandoned(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Channel-side resources owned by a running session.
#[derive(Default)]
struct SessionIo {
    connecting: Option<ConnectFuture>,
    channel: Option<Box<dyn Channel>>,
    timer: ConnectTimer,
}

enum Wake {
    Abandon,
    Connected(Result<Box<dyn Channel>, ChannelError>),
    Input(Input),
}

/// One request/response exchange over its own channel.
pub struct ProcessingSession {
    id: String,
    service_url: String,
    machine: SessionMachine,
    connector: Arc<dyn Connector>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    cancel: CancellationToken,
}

impl ProcessingSession {
    /// Validate `request` and prepare a session. No channel is opened yet.
    pub fn new(
        request: SessionRequest,
        options: &SessionOptions,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, RequestError> {
        request.validate(options.clock.now_ms(), options.reference_ttl)?;
        let id = uuid::Uuid::new_v4().to_string();
        debug!(session_id = %id, mode = %request.mode(), garment_url = request.garment_url(), "session created");
        Ok(Self {
            id,
            service_url: options.service_url.clone(),
            machine: SessionMachine::new(request.to_message(), options.connect_timeout),
            connector,
            events: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Stream progress and the outcome to `events`.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Run the session to its terminal outcome.
    ///
    /// Fails with [`SessionError::Abandoned`] if the handle abandoned it
    /// first, and [`SessionError::AlreadyStarted`] on a second call.
    pub async fn start(&mut self) -> Result<SessionOutcome, SessionError> {
        let span = info_span!("session", session_id = %self.id, url = %self.service_url);
        self.drive().instrument(span).await
    }

    async fn drive(&mut self) -> Result<SessionOutcome, SessionError> {
        let mut io = SessionIo::default();
        if self.cancel.is_cancelled() {
            let effects = self.machine.abandon();
            self.run_effects(effects, &mut io).await;
            return Err(SessionError::Abandoned);
        }
        let effects = self.machine.start()?;
        self.run_effects(effects, &mut io).await;

        let cancel = self.cancel.clone();
        loop {
            if self.machine.is_terminal() {
                let Some(outcome) = self.machine.outcome() else {
                    return Err(SessionError::Abandoned);
                };
                info!(success = outcome.is_success(), "session finished");
                return Ok(outcome.clone());
            }
            let wake = tokio::select! {
                biased;
                () = cancel.cancelled() => Wake::Abandon,
                result = poll_connect(&mut io.connecting), if io.connecting.is_some() => {
                    Wake::Connected(result)
                },
                () = io.timer.fired(), if io.timer.is_armed() => Wake::Input(Input::ConnectTimeout),
                event = recv_event(&mut io.channel), if io.channel.is_some() => {
                    Wake::Input(event.into())
                },
            };
            let input = match wake {
                Wake::Abandon => {
                    let effects = self.machine.abandon();
                    self.run_effects(effects, &mut io).await;
                    info!("session abandoned");
                    return Err(SessionError::Abandoned);
                },
                Wake::Connected(Ok(channel)) => {
                    io.connecting = None;
                    io.channel = Some(channel);
                    Input::Opened
                },
                Wake::Connected(Err(e)) => {
                    io.connecting = None;
                    Input::Error(e.to_string())
                },
                Wake::Input(input) => input,
            };
            let effects = self.machine.handle(input);
            self.run_effects(effects, &mut io).await;
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>, io: &mut SessionIo) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            if let Some(input) = self.perform(effect, io).await {
                queue.extend(self.machine.handle(input));
            }
        }
    }

    /// Carry out one effect. A failed send comes back as an input.
    async fn perform(&mut self, effect: Effect, io: &mut SessionIo) -> Option<Input> {
        match effect {
            Effect::OpenChannel => {
                let connector = Arc::clone(&self.connector);
                let url = self.service_url.clone();
                info!(url = %url, "connecting to processing service");
                io.connecting = Some(Box::pin(async move { connector.connect(&url).await }));
            },
            Effect::ArmConnectTimer(after) => io.timer.arm(after),
            Effect::DisarmConnectTimer => io.timer.disarm(),
            Effect::Transmit(message) => {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => return Some(Input::Error(e.to_string())),
                };
                let Some(channel) = io.channel.as_mut() else {
                    return Some(Input::Error("transmit without an open channel".into()));
                };
                info!(kind = message.kind(), bytes = text.len(), "request sent");
                if let Err(e) = channel.send_text(text).await {
                    return Some(Input::Error(e.to_string()));
                }
            },
            Effect::CloseChannel => {
                io.timer.disarm();
                if io.connecting.take().is_some() {
                    debug!("pending connect dropped");
                }
                if let Some(mut channel) = io.channel.take() {
                    channel.close().await;
                }
            },
            Effect::EmitProgress(message) => self.emit(SessionEvent::Progress(message)),
            Effect::EmitOutcome(outcome) => self.emit(SessionEvent::Outcome(outcome)),
        }
        None
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            warn!("session event receiver dropped");
        }
    }
}

async fn poll_connect(
    pending: &mut Option<ConnectFuture>,
) -> Result<Box<dyn Channel>, ChannelError> {
    match pending.as_mut() {
        Some(connect) => connect.await,
        None => std::future::pending().await,
    }
}

async fn recv_event(channel: &mut Option<Box<dyn Channel>>) -> ChannelEvent {
    match channel.as_mut() {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
