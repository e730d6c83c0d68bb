use std::{fmt, time::Duration};

use {
    tracing::debug,
    tryon_cache::{ImageCache, ReferenceImage},
    tryon_protocol::ClientMessage,
    url::Url,
};

use crate::error::RequestError;

/// How the user asked for the garment to be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Garment only, against the service's default model.
    #[default]
    Quick,
    /// Garment on the user's cached reference image.
    Custom,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quick => "quick",
            Self::Custom => "custom",
        })
    }
}

/// The one request a session will transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    Legacy {
        garment_url: String,
    },
    Composite {
        reference_image: ReferenceImage,
        garment_url: String,
    },
}

impl SessionRequest {
    pub fn legacy(garment_url: impl Into<String>) -> Self {
        Self::Legacy {
            garment_url: garment_url.into(),
        }
    }

    pub fn composite(reference_image: ReferenceImage, garment_url: impl Into<String>) -> Self {
        Self::Composite {
            reference_image,
            garment_url: garment_url.into(),
        }
    }

    /// Build the request for `mode`, reading the reference image from
    /// `cache` in custom mode.
    ///
    /// The cache already drops expired entries, so an absent entry here means
    /// the user must upload again.
    pub async fn for_mode(
        mode: ProcessingMode,
        garment_url: impl Into<String>,
        cache: &ImageCache,
    ) -> Result<Self, RequestError> {
        match mode {
            ProcessingMode::Quick => Ok(Self::legacy(garment_url)),
            ProcessingMode::Custom => {
                let reference = cache.get().await?.ok_or(RequestError::MissingReference)?;
                debug!(
                    stored_at_ms = reference.stored_at_ms,
                    "using cached reference image"
                );
                Ok(Self::composite(reference, garment_url))
            },
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        match self {
            Self::Legacy { .. } => ProcessingMode::Quick,
            Self::Composite { .. } => ProcessingMode::Custom,
        }
    }

    pub fn garment_url(&self) -> &str {
        match self {
            Self::Legacy { garment_url } | Self::Composite { garment_url, .. } => garment_url,
        }
    }

    /// Check the request against the clock it is about to run under.
    pub fn validate(&self, now_ms: u64, ttl: Duration) -> Result<(), RequestError> {
        check_garment_url(self.garment_url())?;
        if let Self::Composite {
            reference_image, ..
        } = self
        {
            if reference_image.encoded_data.is_empty() {
                return Err(RequestError::EmptyReference);
            }
            if reference_image.is_expired_at(now_ms, ttl) {
                return Err(RequestError::ExpiredReference {
                    stored_at_ms: reference_image.stored_at_ms,
                    expired_at_ms: reference_image.expires_at_ms(ttl),
                });
            }
        }
        Ok(())
    }

    pub fn to_message(&self) -> ClientMessage {
        match self {
            Self::Legacy { garment_url } => ClientMessage::Image {
                url: garment_url.clone(),
            },
            Self::Composite {
                reference_image,
                garment_url,
            } => ClientMessage::ProcessViton {
                model_image_base64: reference_image.encoded_data.clone(),
                garment_url: garment_url.clone(),
            },
        }
    }
}

fn check_garment_url(raw: &str) -> Result<(), RequestError> {
    let invalid = |reason: String| RequestError::InvalidGarmentUrl {
        url: raw.to_string(),
        reason,
    };
    if raw.trim().is_empty() {
        return Err(invalid("empty".into()));
    }
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" | "data" => Ok(()),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}
