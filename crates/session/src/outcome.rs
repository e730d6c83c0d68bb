use std::fmt;

use serde::Serialize;

/// Why a session ended without a service answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    /// The channel did not open before the connect deadline.
    ConnectTimeout,
    /// The channel reported an error, or could not be established.
    ChannelError,
    /// The channel closed before a terminal message arrived.
    AbnormalClose,
    /// A frame could not be parsed or had an unrecognized type.
    MalformedMessage,
}

impl TransportFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectTimeout => "connect_timeout",
            Self::ChannelError => "channel_error",
            Self::AbnormalClose => "abnormal_close",
            Self::MalformedMessage => "malformed_message",
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the pipeline a failure happened, for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Upload,
    Connect,
    Transport,
    Server,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upload => "upload",
            Self::Connect => "connect",
            Self::Transport => "transport",
            Self::Server => "server",
        })
    }
}

/// The single terminal result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `result_image` is either base64 image data or an image URL.
    Success { result_image: String },
    ServerError { message: String },
    TransportError {
        reason: TransportFailure,
        stage: FailureStage,
        detail: String,
    },
}

impl SessionOutcome {
    pub fn transport(
        reason: TransportFailure,
        stage: FailureStage,
        detail: impl Into<String>,
    ) -> Self {
        Self::TransportError {
            reason,
            stage,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// `None` for a success.
    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            Self::Success { .. } => None,
            Self::ServerError { .. } => Some(FailureStage::Server),
            Self::TransportError { stage, .. } => Some(*stage),
        }
    }

    pub fn transport_reason(&self) -> Option<TransportFailure> {
        match self {
            Self::TransportError { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { .. } => f.write_str("processing complete"),
            Self::ServerError { message } => write!(f, "server error: {message}"),
            Self::TransportError {
                reason: TransportFailure::ConnectTimeout,
                ..
            } => f.write_str("connect error: processing service did not respond in time"),
            Self::TransportError {
                reason,
                stage,
                detail,
            } => write!(f, "{stage} error ({reason}): {detail}"),
        }
    }
}

/// What a session reports to its caller while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Progress(String),
    Outcome(SessionOutcome),
}
