/// Config schema types (processing service, reference cache, page extractor).
use std::{path::PathBuf, time::Duration};

use {
    serde::{Deserialize, Serialize},
    tryon_protocol::{CONNECT_TIMEOUT_MS, DEFAULT_SERVICE_URL, REFERENCE_TTL_MS},
};

const MS_PER_HOUR: u64 = 60 * 60 * 1_000;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TryonConfig {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub extractor: ExtractorConfig,
}

/// Where the processing service listens and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// WebSocket endpoint. Defaults to [`DEFAULT_SERVICE_URL`].
    pub url: String,
    /// Seconds to wait for the channel to open before giving up.
    pub connect_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.into(),
            connect_timeout_secs: CONNECT_TIMEOUT_MS / 1_000,
        }
    }
}

impl ServiceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// JSON file under the data directory; survives restarts.
    #[default]
    File,
    /// Process memory only.
    Memory,
}

/// Reference image cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Hours a stored reference image stays valid. Defaults to 24.
    pub ttl_hours: u64,
    /// Override for the file backend location.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            ttl_hours: REFERENCE_TTL_MS / MS_PER_HOUR,
            path: None,
        }
    }
}

impl CacheConfig {
    /// Saturates instead of overflowing for absurdly large `ttl_hours`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(60 * 60))
    }

    /// File backend path: the configured override, or
    /// `<data_dir>/reference_image.json`.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| crate::loader::data_dir().join("reference_image.json"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Id,
    Class,
}

impl std::fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id => write!(f, "id"),
            Self::Class => write!(f, "class"),
        }
    }
}

/// Declarative lookup for a product image on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    /// Element id, or one or more space-separated class names.
    pub value: String,
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Id,
            value: value.into(),
        }
    }

    pub fn class(value: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Class,
            value: value.into(),
        }
    }
}

/// Known product-image locations on supported shops.
pub fn default_locators() -> Vec<Locator> {
    vec![
        // Amazon product page
        Locator::id("landingImage"),
        // Hepsiburada listing (class names rotate with their frontend builds)
        Locator::class("i9jTSpEeoI29_M1mOKct hb-HbImage-view__image"),
        // Hepsiburada product page
        Locator::class("hbImageView-module_hbImage__Ca3xO"),
        // Trendyol listing
        Locator::class("p-card-img"),
        // Trendyol product page
        Locator::class("_carouselThumbsImage_ddecc3e"),
    ]
}

/// Page fetching and image lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub locators: Vec<Locator>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            locators: default_locators(),
            timeout_secs: 15,
            user_agent: format!("tryon/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
