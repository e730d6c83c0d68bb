use {thiserror::Error, tryon_cache::CacheError};

/// A request that cannot be turned into a session.
///
/// Raised before any channel is opened.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("custom mode needs a reference image; upload one first")]
    MissingReference,

    #[error("reference image stored at {stored_at_ms} expired at {expired_at_ms}; upload it again")]
    ExpiredReference {
        stored_at_ms: u64,
        expired_at_ms: u64,
    },

    #[error("reference image payload is empty")]
    EmptyReference,

    #[error("invalid garment URL `{url}`: {reason}")]
    InvalidGarmentUrl { url: String, reason: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Misuse of a session, as opposed to a failed outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("session abandoned before it finished")]
    Abandoned,
}

/// Failure reported by a [`Connector`](crate::Connector) or
/// [`Channel`](crate::Channel).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),
}
