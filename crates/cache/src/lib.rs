//! Reference image cache.
//!
//! Holds at most one user-supplied model image together with the time it
//! was stored. Entries expire lazily: a read that finds an entry older than
//! the TTL removes it and reports nothing cached. There is no background
//! sweeper.
//!
//! Persistence is pluggable through [`ReferenceStore`]; the in-memory store
//! is used by tests and `backend = "memory"`, the JSON file store keeps the
//! image across runs.

pub mod error;
pub mod image_cache;
pub mod store;
pub mod upload;

pub use {
    error::{CacheError, Result},
    image_cache::{ImageCache, ReferenceImage},
    store::{JsonFileStore, MemoryStore, ReferenceStore, StoredRecord},
    upload::{encode_reference_image, read_reference_image},
};
