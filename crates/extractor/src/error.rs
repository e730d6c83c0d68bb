use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid page URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("page request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
