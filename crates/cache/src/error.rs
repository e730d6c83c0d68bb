use {thiserror::Error, tryon_common::FromMessage};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The user-supplied file cannot be used as a reference image.
    #[error("upload rejected: {0}")]
    Upload(String),

    #[error("{0}")]
    Message(String),
}

impl CacheError {
    #[must_use]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }
}

impl FromMessage for CacheError {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Error = CacheError;
pub type Result<T> = std::result::Result<T, CacheError>;

tryon_common::impl_context!();
