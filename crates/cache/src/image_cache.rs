use std::{sync::Arc, time::Duration};

use {
    tokio::sync::Mutex,
    tracing::{debug, info},
    tryon_common::{Clock, SystemClock},
    tryon_config::{CacheBackend, CacheConfig},
};

use crate::{
    error::Result,
    store::{JsonFileStore, MemoryStore, ReferenceStore, StoredRecord},
};

/// A user-supplied model image as held by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Opaque, self-describing payload (normally a `data:` URL).
    pub encoded_data: String,
    pub stored_at_ms: u64,
}

fn ttl_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

impl ReferenceImage {
    pub fn expires_at_ms(&self, ttl: Duration) -> u64 {
        self.stored_at_ms.saturating_add(ttl_ms(ttl))
    }

    /// Valid while `now - stored_at <= ttl`.
    pub fn is_expired_at(&self, now_ms: u64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.stored_at_ms) > ttl_ms(ttl)
    }

    pub fn age_at(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.stored_at_ms))
    }
}

impl From<StoredRecord> for ReferenceImage {
    fn from(record: StoredRecord) -> Self {
        Self {
            encoded_data: record.model_image_data,
            stored_at_ms: record.model_image_timestamp,
        }
    }
}

/// Single-slot cache for the reference image.
///
/// One instance per process, shared behind an `Arc`. Every operation holds
/// an async lock for its whole load/check/write sequence. Across processes
/// the store serializes each call, and expiry removes the entry only if it is
/// still the one that was found stale.
pub struct ImageCache {
    store: Arc<dyn ReferenceStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    lock: Mutex<()>,
}

impl ImageCache {
    pub fn new(store: Arc<dyn ReferenceStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            lock: Mutex::new(()),
        }
    }

    /// Build the cache selected by `[cache]`, on the system clock.
    pub fn from_config(config: &CacheConfig) -> Self {
        let store: Arc<dyn ReferenceStore> = match config.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::File => Arc::new(JsonFileStore::new(config.resolved_path())),
        };
        Self::new(store, Arc::new(SystemClock), config.ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Store `encoded_data`, replacing whatever was cached.
    pub async fn put(&self, encoded_data: impl Into<String>) -> Result<ReferenceImage> {
        let _guard = self.lock.lock().await;
        let image = ReferenceImage {
            encoded_data: encoded_data.into(),
            stored_at_ms: self.clock.now_ms(),
        };
        self.store
            .save(&StoredRecord {
                has_model_image: true,
                model_image_data: image.encoded_data.clone(),
                model_image_timestamp: image.stored_at_ms,
            })
            .await?;
        info!(
            bytes = image.encoded_data.len(),
            stored_at_ms = image.stored_at_ms,
            "reference image stored"
        );
        Ok(image)
    }

    /// The cached image if it is still within its TTL.
    ///
    /// A stale entry is removed before returning `None`.
    pub async fn get(&self) -> Result<Option<ReferenceImage>> {
        let _guard = self.lock.lock().await;
        let Some(record) = self.store.load().await? else {
            return Ok(None);
        };
        let image = ReferenceImage::from(record.clone());
        let now = self.clock.now_ms();
        if image.is_expired_at(now, self.ttl) {
            // Another process may have stored a fresh image since the load.
            let removed = self.store.remove_if(&record).await?;
            debug!(
                stored_at_ms = image.stored_at_ms,
                now_ms = now,
                ttl_secs = self.ttl.as_secs(),
                removed,
                "reference image expired"
            );
            return Ok(None);
        }
        Ok(Some(image))
    }

    /// Drop the cached image, if any.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.remove().await?;
        debug!("reference image cleared");
        Ok(())
    }
}
