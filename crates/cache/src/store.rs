use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use {
    async_trait::async_trait,
    fd_lock::RwLock,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    tempfile::NamedTempFile,
    tracing::debug,
};

use crate::error::{CacheError, Context, Result};

const KEY_PRESENT: &str = "hasModelImage";
const KEY_DATA: &str = "modelImageData";
const KEY_TIMESTAMP: &str = "modelImageTimestamp";

/// The persisted form of the single cache slot: a presence flag, the encoded
/// image, and the store time. The three keys are always read and written
/// together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "hasModelImage")]
    pub has_model_image: bool,
    #[serde(rename = "modelImageData")]
    pub model_image_data: String,
    #[serde(rename = "modelImageTimestamp")]
    pub model_image_timestamp: u64,
}

/// Backing key-value store for the reference image slot.
///
/// Implementations must treat a record as one unit: `save` replaces all three
/// keys, `remove` drops all three, and `load` never returns a half-written
/// record. Each call is atomic with respect to every other caller of the same
/// slot, including other processes for persistent stores.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredRecord>>;
    async fn save(&self, record: &StoredRecord) -> Result<()>;
    async fn remove(&self) -> Result<()>;
    /// Remove the slot only if it still holds `expected`. Returns whether
    /// anything was removed.
    async fn remove_if(&self, expected: &StoredRecord) -> Result<bool>;
}

// ── In-memory implementation ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<MutexGuard<'_, Option<StoredRecord>>> {
        self.slot
            .lock()
            .map_err(|_| CacheError::Message("memory store poisoned".into()))
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn load(&self) -> Result<Option<StoredRecord>> {
        Ok(self.slot()?.clone().filter(|r| r.has_model_image))
    }

    async fn save(&self, record: &StoredRecord) -> Result<()> {
        *self.slot()? = Some(record.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }

    async fn remove_if(&self, expected: &StoredRecord) -> Result<bool> {
        let mut slot = self.slot()?;
        if slot.as_ref() == Some(expected) {
            *slot = None;
            return Ok(true);
        }
        Ok(false)
    }
}

// ── JSON file implementation ────────────────────────────────────────────────

/// Keeps the record as three top-level keys of a JSON object on disk.
/// Unrelated keys already present in the file are preserved.
///
/// Every operation holds an exclusive `fd-lock` on a sidecar `<file>.lock`
/// for its whole read/modify/write, so separate processes sharing the file
/// are serialized. Writes go to a uniquely named temp file in the same
/// directory and are renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(&self.path)
    }

    /// Run `op` on a blocking thread while holding the file lock.
    async fn locked<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let lock_path = lock_path_for(&path);
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&lock_path)
                .with_context(|| format!("open {}", lock_path.display()))?;
            let mut lock = RwLock::new(file);
            let _guard = lock
                .write()
                .with_context(|| format!("lock {}", lock_path.display()))?;
            op(&path)
        })
        .await
        .map_err(|e| CacheError::Message(format!("reference cache task failed: {e}")))?
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn read_object(path: &Path) -> Result<Map<String, Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("corrupt reference cache {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CacheError::Message(format!(
            "reference cache {} is not a JSON object",
            path.display()
        ))),
    }
}

fn write_object(path: &Path, object: Map<String, Value>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let body = serde_json::to_string_pretty(&Value::Object(object))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(body.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

fn record_from(object: &Map<String, Value>, path: &Path) -> Option<StoredRecord> {
    let present = object
        .get(KEY_PRESENT)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let data = object.get(KEY_DATA).and_then(Value::as_str);
    let timestamp = object.get(KEY_TIMESTAMP).and_then(Value::as_u64);

    match (present, data, timestamp) {
        (true, Some(data), Some(timestamp)) => Some(StoredRecord {
            has_model_image: true,
            model_image_data: data.to_string(),
            model_image_timestamp: timestamp,
        }),
        (true, ..) => {
            debug!(path = %path.display(), "incomplete reference record, treating as absent");
            None
        },
        _ => None,
    }
}

/// Drop the three record keys; rewrites the file only if any were present.
fn strip_record(path: &Path, mut object: Map<String, Value>) -> Result<()> {
    let had_any = [KEY_PRESENT, KEY_DATA, KEY_TIMESTAMP]
        .iter()
        .fold(false, |acc, key| object.remove(*key).is_some() || acc);
    if had_any {
        write_object(path, object)?;
    }
    Ok(())
}

#[async_trait]
impl ReferenceStore for JsonFileStore {
    async fn load(&self) -> Result<Option<StoredRecord>> {
        self.locked(|path| Ok(record_from(&read_object(path)?, path)))
            .await
    }

    async fn save(&self, record: &StoredRecord) -> Result<()> {
        let record = record.clone();
        self.locked(move |path| {
            let mut object = read_object(path)?;
            object.insert(KEY_PRESENT.into(), Value::Bool(record.has_model_image));
            object.insert(KEY_DATA.into(), Value::String(record.model_image_data));
            object.insert(
                KEY_TIMESTAMP.into(),
                Value::from(record.model_image_timestamp),
            );
            write_object(path, object)
        })
        .await
    }

    async fn remove(&self) -> Result<()> {
        self.locked(|path| strip_record(path, read_object(path)?))
            .await
    }

    async fn remove_if(&self, expected: &StoredRecord) -> Result<bool> {
        let expected = expected.clone();
        self.locked(move |path| {
            let object = read_object(path)?;
            if record_from(&object, path).as_ref() != Some(&expected) {
                debug!(path = %path.display(), "reference record changed, keeping it");
                return Ok(false);
            }
            strip_record(path, object)?;
            Ok(true)
        })
        .await
    }
}
