//! Processing session: one request, one channel, one outcome.
//!
//! The session is split into a pure state machine ([`SessionMachine`]) that
//! maps channel events to effects, and an async driver
//! ([`ProcessingSession`]) that performs those effects against a real or
//! fake [`Connector`]. Callers observe progress and the terminal outcome
//! through a [`SessionEvent`] stream.
//!
//! # Example
//!
//! ```ignore
//! use tryon_session::{ProcessingSession, SessionOptions, SessionRequest, WsConnector};
//!
//! let request = SessionRequest::legacy("https://shop.example/garment.jpg");
//! let mut session =
//!     ProcessingSession::new(request, &SessionOptions::default(), Arc::new(WsConnector))?;
//! let outcome = session.start().await?;
//! ```

pub mod channel;
pub mod error;
pub mod machine;
pub mod outcome;
pub mod request;
pub mod session;
pub mod timer;
pub mod ws;

pub use {
    channel::{Channel, ChannelEvent, Connector},
    error::{ChannelError, RequestError, SessionError},
    machine::{Effect, Input, Phase, SessionMachine},
    outcome::{FailureStage, SessionEvent, SessionOutcome, TransportFailure},
    request::{ProcessingMode, SessionRequest},
    session::{ProcessingSession, SessionHandle, SessionOptions},
    timer::ConnectTimer,
    ws::{WsChannel, WsConnector},
};
