//! Pure session state machine.
//!
//! `(phase, input) -> effects`. No I/O happens here; the driver in
//! [`crate::session`] performs the effects and feeds channel events back in
//! as [`Input`]s.

use std::time::Duration;

use {
    tracing::{debug, warn},
    tryon_protocol::{ClientMessage, ServerMessage, close_codes},
};

use crate::{
    channel::ChannelEvent,
    error::SessionError,
    outcome::{FailureStage, SessionOutcome, TransportFailure},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    AwaitingResponse,
    Finished,
    Abandoned,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Abandoned)
    }
}

/// Something that happened to the channel or the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Opened,
    Message(String),
    Error(String),
    Closed { code: Option<u16>, reason: String },
    ConnectTimeout,
}

impl From<ChannelEvent> for Input {
    fn from(event: ChannelEvent) -> Self {
        match event {
            ChannelEvent::Message(text) => Self::Message(text),
            ChannelEvent::Error(detail) => Self::Error(detail),
            ChannelEvent::Closed { code, reason } => Self::Closed { code, reason },
        }
    }
}

/// Work the driver must do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenChannel,
    ArmConnectTimer(Duration),
    DisarmConnectTimer,
    Transmit(ClientMessage),
    CloseChannel,
    EmitProgress(String),
    EmitOutcome(SessionOutcome),
}

#[derive(Debug)]
pub struct SessionMachine {
    request: ClientMessage,
    connect_timeout: Duration,
    phase: Phase,
    outcome: Option<SessionOutcome>,
    channel_closed: bool,
    transmitted: bool,
}

impl SessionMachine {
    pub fn new(request: ClientMessage, connect_timeout: Duration) -> Self {
        Self {
            request,
            connect_timeout,
            phase: Phase::Idle,
            outcome: None,
            channel_closed: true,
            transmitted: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn start(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.phase = Phase::Connecting;
        self.channel_closed = false;
        debug!(
            kind = self.request.kind(),
            timeout_ms = self.connect_timeout.as_millis() as u64,
            "session connecting"
        );
        Ok(vec![
            Effect::OpenChannel,
            Effect::ArmConnectTimer(self.connect_timeout),
        ])
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        match self.phase {
            Phase::Idle => {
                debug!(?input, "input before start ignored");
                Vec::new()
            },
            Phase::Finished | Phase::Abandoned => {
                debug!(phase = ?self.phase, ?input, "input after terminal ignored");
                Vec::new()
            },
            Phase::Connecting => self.handle_connecting(input),
            Phase::AwaitingResponse => self.handle_awaiting(input),
        }
    }

    /// Stop without an outcome. Releases the channel and the timer.
    pub fn abandon(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::Finished | Phase::Abandoned => Vec::new(),
            Phase::Idle => {
                self.phase = Phase::Abandoned;
                Vec::new()
            },
            Phase::Connecting | Phase::AwaitingResponse => {
                let mut effects = Vec::new();
                if self.phase == Phase::Connecting {
                    effects.push(Effect::DisarmConnectTimer);
                }
                self.phase = Phase::Abandoned;
                self.push_close(&mut effects);
                debug!("session abandoned");
                effects
            },
        }
    }

    fn handle_connecting(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Opened => {
                self.phase = Phase::AwaitingResponse;
                let mut effects = vec![Effect::DisarmConnectTimer];
                if !self.transmitted {
                    self.transmitted = true;
                    effects.push(Effect::Transmit(self.request.clone()));
                }
                debug!("channel open, request queued");
                effects
            },
            Input::ConnectTimeout => self.fail(
                TransportFailure::ConnectTimeout,
                FailureStage::Connect,
                format!(
                    "channel not open after {}ms",
                    self.connect_timeout.as_millis()
                ),
            ),
            Input::Error(detail) => {
                self.fail(TransportFailure::ChannelError, FailureStage::Connect, detail)
            },
            Input::Closed { code, reason } => {
                self.channel_closed = true;
                self.fail(
                    TransportFailure::ChannelError,
                    FailureStage::Connect,
                    format!("closed before open ({})", describe_close(code, &reason)),
                )
            },
            Input::Message(_) => self.fail(
                TransportFailure::MalformedMessage,
                FailureStage::Connect,
                "message received before the channel opened",
            ),
        }
    }

    fn handle_awaiting(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Message(text) => self.handle_message(&text),
            Input::Error(detail) => self.fail(
                TransportFailure::ChannelError,
                FailureStage::Transport,
                detail,
            ),
            Input::Closed { code, reason } => {
                self.channel_closed = true;
                self.fail(
                    TransportFailure::AbnormalClose,
                    FailureStage::Transport,
                    format!(
                        "closed before a result arrived ({})",
                        describe_close(code, &reason)
                    ),
                )
            },
            Input::ConnectTimeout => {
                debug!("stale connect timer ignored");
                Vec::new()
            },
            Input::Opened => self.fail(
                TransportFailure::ChannelError,
                FailureStage::Transport,
                "channel reported open twice",
            ),
        }
    }

    fn handle_message(&mut self, text: &str) -> Vec<Effect> {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                return self.fail(
                    TransportFailure::MalformedMessage,
                    FailureStage::Transport,
                    e.to_string(),
                );
            },
        };
        match message {
            ServerMessage::Status { message } => {
                debug!(status = %message, "service progress");
                vec![Effect::EmitProgress(message)]
            },
            ServerMessage::Error { message } => {
                warn!(error = %message, "service reported an error");
                self.finish(SessionOutcome::ServerError { message })
            },
            ServerMessage::ProcessedImage(image) => match image.result_image() {
                Some(result) => {
                    let result_image = result.to_string();
                    debug!(bytes = result_image.len(), "result received");
                    self.finish(SessionOutcome::Success { result_image })
                },
                None => self.fail(
                    TransportFailure::MalformedMessage,
                    FailureStage::Transport,
                    "processed_image without a result",
                ),
            },
        }
    }

    fn fail(
        &mut self,
        reason: TransportFailure,
        stage: FailureStage,
        detail: impl Into<String>,
    ) -> Vec<Effect> {
        let outcome = SessionOutcome::transport(reason, stage, detail);
        warn!(reason = %reason, stage = %stage, outcome = %outcome, "session failed");
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: SessionOutcome) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase == Phase::Connecting {
            effects.push(Effect::DisarmConnectTimer);
        }
        self.phase = Phase::Finished;
        self.push_close(&mut effects);
        self.outcome = Some(outcome.clone());
        effects.push(Effect::EmitOutcome(outcome));
        effects
    }

    fn push_close(&mut self, effects: &mut Vec<Effect>) {
        if !self.channel_closed {
            self.channel_closed = true;
            effects.push(Effect::CloseChannel);
        }
    }
}

fn describe_close(code: Option<u16>, reason: &str) -> String {
    let Some(code) = code else {
        return "no close frame".to_string();
    };
    let label = match code {
        close_codes::NORMAL => "normal",
        close_codes::GOING_AWAY => "going away",
        close_codes::ABNORMAL => "abnormal",
        _ => "code",
    };
    if reason.is_empty() {
        format!("{label} {code}")
    } else {
        format!("{label} {code}: {reason}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn request() -> ClientMessage {
        ClientMessage::Image {
            url: "https://cdn.example/g.jpg".into(),
        }
    }

    fn started() -> SessionMachine {
        let mut machine = SessionMachine::new(request(), TIMEOUT);
        machine.start().unwrap();
        machine
    }

    fn open() -> SessionMachine {
        let mut machine = started();
        machine.handle(Input::Opened);
        machine
    }

    fn closed(code: u16) -> Input {
        Input::Closed {
            code: Some(code),
            reason: String::new(),
        }
    }

    fn outcomes(effects: &[Effect]) -> Vec<&SessionOutcome> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::EmitOutcome(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_opens_and_arms() {
        let mut machine = SessionMachine::new(request(), TIMEOUT);
        assert_eq!(machine.start().unwrap(), vec![
            Effect::OpenChannel,
            Effect::ArmConnectTimer(TIMEOUT)
        ]);
        assert_eq!(machine.phase(), Phase::Connecting);
        assert_eq!(machine.start().unwrap_err(), SessionError::AlreadyStarted);
    }

    #[test]
    fn open_disarms_then_transmits() {
        let mut machine = started();
        let effects = machine.handle(Input::Opened);
        assert_eq!(effects, vec![
            Effect::DisarmConnectTimer,
            Effect::Transmit(request())
        ]);
        assert_eq!(machine.phase(), Phase::AwaitingResponse);
    }

    #[test]
    fn status_then_result_succeeds() {
        let mut machine = open();
        let effects = machine.handle(Input::Message(
            r#"{"type":"status","message":"Processing"}"#.into(),
        ));
        assert_eq!(effects, vec![Effect::EmitProgress("Processing".into())]);

        let effects = machine.handle(Input::Message(
            r#"{"type":"processed_image","image_base64":"AAAA"}"#.into(),
        ));
        assert_eq!(effects, vec![
            Effect::CloseChannel,
            Effect::EmitOutcome(SessionOutcome::Success {
                result_image: "AAAA".into()
            })
        ]);
        assert_eq!(machine.phase(), Phase::Finished);
    }

    #[test]
    fn service_error_is_server_outcome() {
        let mut machine = open();
        let effects =
            machine.handle(Input::Message(r#"{"type":"error","message":"bad"}"#.into()));
        assert_eq!(outcomes(&effects), vec![&SessionOutcome::ServerError {
            message: "bad".into()
        }]);
    }

    #[test]
    fn timeout_before_open_fails_and_closes() {
        let mut machine = started();
        let effects = machine.handle(Input::ConnectTimeout);
        assert_eq!(effects[..2], [
            Effect::DisarmConnectTimer,
            Effect::CloseChannel
        ]);
        assert_eq!(
            machine.outcome().and_then(SessionOutcome::transport_reason),
            Some(TransportFailure::ConnectTimeout)
        );
        // A late open after the deadline changes nothing.
        assert!(machine.handle(Input::Opened).is_empty());
    }

    #[test]
    fn timeout_after_open_is_ignored() {
        let mut machine = open();
        assert!(machine.handle(Input::ConnectTimeout).is_empty());
        assert_eq!(machine.phase(), Phase::AwaitingResponse);
    }

    #[rstest]
    #[case(1000)]
    #[case(1001)]
    #[case(1006)]
    fn close_while_awaiting_is_abnormal(#[case] code: u16) {
        let mut machine = open();
        let effects = machine.handle(closed(code));
        // Already closed by the peer: no CloseChannel.
        assert_eq!(effects.len(), 1);
        let outcome = outcomes(&effects)[0];
        assert_eq!(
            outcome.transport_reason(),
            Some(TransportFailure::AbnormalClose)
        );
        assert!(outcome.to_string().contains(&code.to_string()));
    }

    #[test]
    fn close_descriptions_name_known_codes() {
        assert_eq!(describe_close(Some(1000), ""), "normal 1000");
        assert_eq!(describe_close(Some(1001), "restart"), "going away 1001: restart");
        assert_eq!(describe_close(Some(1006), ""), "abnormal 1006");
        assert_eq!(describe_close(Some(4000), "busy"), "code 4000: busy");
        assert_eq!(describe_close(None, ""), "no close frame");
    }

    #[test]
    fn close_before_open_is_channel_error() {
        let mut machine = started();
        let effects = machine.handle(closed(1006));
        assert_eq!(effects[0], Effect::DisarmConnectTimer);
        assert_eq!(outcomes(&effects)[0].stage(), Some(FailureStage::Connect));
        assert!(!effects.contains(&Effect::CloseChannel));
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"type":"mystery"}"#)]
    #[case(r#"{"type":"processed_image"}"#)]
    #[case(r#"{"type":"status"}"#)]
    fn bad_frames_are_malformed(#[case] frame: &str) {
        let mut machine = open();
        let effects = machine.handle(Input::Message(frame.into()));
        assert_eq!(effects[0], Effect::CloseChannel);
        assert_eq!(
            outcomes(&effects)[0].transport_reason(),
            Some(TransportFailure::MalformedMessage)
        );
    }

    #[test]
    fn unexpected_inputs_terminate() {
        let mut machine = started();
        let effects = machine.handle(Input::Message("{}".into()));
        assert_eq!(
            outcomes(&effects)[0].transport_reason(),
            Some(TransportFailure::MalformedMessage)
        );

        let mut machine = open();
        let effects = machine.handle(Input::Opened);
        assert_eq!(
            outcomes(&effects)[0].transport_reason(),
            Some(TransportFailure::ChannelError)
        );
    }

    #[test]
    fn exactly_one_outcome_and_one_transmit() {
        let inputs = [
            Input::Opened,
            Input::Opened,
            Input::Message(r#"{"type":"processed_image","image_url":"https://r/x.png"}"#.into()),
            Input::Message(r#"{"type":"error","message":"late"}"#.into()),
            closed(1000),
            closed(1006),
            Input::Error("late".into()),
            Input::ConnectTimeout,
        ];
        let mut machine = started();
        let mut all = Vec::new();
        for input in inputs {
            all.extend(machine.handle(input));
        }
        let transmits = all
            .iter()
            .filter(|e| matches!(e, Effect::Transmit(_)))
            .count();
        let closes = all.iter().filter(|e| **e == Effect::CloseChannel).count();
        assert_eq!(transmits, 1);
        assert_eq!(closes, 1);
        assert_eq!(outcomes(&all).len(), 1);
    }

    #[test]
    fn normal_close_after_result_emits_nothing() {
        let mut machine = open();
        let effects = machine
            .handle(Input::Message(r#"{"type":"processed_image","image_base64":"AAAA"}"#.into()));
        assert_eq!(outcomes(&effects).len(), 1);
        assert!(machine.is_terminal());

        assert!(machine.handle(closed(1000)).is_empty());
        assert!(machine.handle(closed(1006)).is_empty());
        assert!(matches!(
            machine.outcome(),
            Some(SessionOutcome::Success { result_image }) if result_image == "AAAA"
        ));
    }

    #[test]
    fn abandon_releases_without_outcome() {
        let mut machine = started();
        assert_eq!(machine.abandon(), vec![
            Effect::DisarmConnectTimer,
            Effect::CloseChannel
        ]);
        assert_eq!(machine.phase(), Phase::Abandoned);
        assert!(machine.outcome().is_none());
        assert!(machine.abandon().is_empty());
        assert!(machine.handle(Input::Opened).is_empty());

        let mut machine = open();
        assert_eq!(machine.abandon(), vec![Effect::CloseChannel]);
    }

    #[test]
    fn abandon_after_finish_is_noop() {
        let mut machine = open();
        machine.handle(Input::Error("reset".into()));
        assert!(machine.abandon().is_empty());
        assert_eq!(machine.phase(), Phase::Finished);
    }
}
