use slatedb::Db;
use slatedb::object_store::ObjectStore;
use slatedb::object_store::local::LocalFileSystem;
use slatedb::object_store::memory::InMemory;
use slatedb::object_store::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::watch::{EventLog, EventType};
use pkg_types::meta::Resource;

/// Persistent state store backed by SlateDB.
///
/// Typed writes go through `create_resource` / `update_resource` /
/// `delete_resource`, which check `resource_version` tokens so that a writer
/// holding a stale copy gets `StoreError::Conflict` instead of clobbering a
/// newer one. Every mutation is published on `event_log`.
#[derive(Clone)]
pub struct StateStore {
    db: Db,
    pub event_log: EventLog,
    /// Serializes read-compare-write sequences of typed writes.
    write_lock: Arc<Mutex<()>>,
}

impl StateStore {
    /// Open (or create) a state store rooted at `path` on the local filesystem.
    pub async fn new(path: &str, event_log_capacity: usize) -> anyhow::Result<Self> {
        info!("Opening SlateDB state store at {}", path);

        // Ensure the data directory exists before opening the object store
        std::fs::create_dir_all(path)
            .map_err(|e| anyhow::anyhow!("Failed to create data directory {}: {}", path, e))?;

        let object_store = Arc::new(
            LocalFileSystem::new_with_prefix(path)
                .map_err(|e| anyhow::anyhow!("Failed to create local object store: {}", e))?,
        );
        Self::open(object_store, event_log_capacity).await
    }

    /// Open a state store whose data lives only in memory.
    pub async fn in_memory(event_log_capacity: usize) -> anyhow::Result<Self> {
        info!("Opening in-memory SlateDB state store");
        Self::open(Arc::new(InMemory::new()), event_log_capacity).await
    }

    async fn open(
        object_store: Arc<dyn ObjectStore>,
        event_log_capacity: usize,
    ) -> anyhow::Result<Self> {
        let db = Db::open(Path::from("/"), object_store)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open SlateDB: {}", e))?;
        Ok(Self {
            db,
            event_log: EventLog::new(event_log_capacity),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Store a value under the given key.
    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.db
            .put(key.as_bytes(), value)
            .await
            .map_err(|e| StoreError::Backend(format!("SlateDB put failed: {}", e)))?;
        self.event_log
            .emit(EventType::Put, key.to_string(), Some(value.to_vec()))
            .await;
        Ok(())
    }

    /// Retrieve the value for a key, or `None` if it does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.db.get(key.as_bytes()).await {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Backend(format!("SlateDB get failed: {}", e))),
        }
    }

    /// Delete a key from the store.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db
            .delete(key.as_bytes())
            .await
            .map_err(|e| StoreError::Backend(format!("SlateDB delete failed: {}", e)))?;
        self.event_log
            .emit(EventType::Delete, key.to_string(), None)
            .await;
        Ok(())
    }

    /// List all key-value pairs whose keys start with `prefix`.
    /// Returns them as `(key_string, raw_bytes)`.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut results = Vec::new();
        let mut iter = self
            .db
            .scan_prefix(prefix.as_bytes())
            .await
            .map_err(|e| StoreError::Backend(format!("SlateDB scan_prefix failed: {}", e)))?;

        // A failed step must not pass for the end of the scan.
        while let Some(kv) = iter
            .next()
            .await
            .map_err(|e| StoreError::Backend(format!("SlateDB scan of {} failed: {}", prefix, e)))?
        {
            let key = String::from_utf8_lossy(&kv.key).to_string();
            results.push((key, kv.value.to_vec()));
        }
        Ok(results)
    }

    /// Fetch and decode the object stored at `key`.
    pub async fn get_resource<T: Resource>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode every object under `prefix`. Entries that fail to decode are
    /// skipped with a warning.
    pub async fn list_resources<T: Resource>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let entries = self.list_prefix(prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_slice(&value) {
                Ok(obj) => Some(obj),
                Err(e) => {
                    warn!("Skipping undecodable {} at {}: {}", T::KIND, key, e);
                    None
                }
            })
            .collect())
    }

    /// Store a new object. Fails with `AlreadyExists` if the key is taken.
    /// Returns the object as stored, carrying its first version.
    pub async fn create_resource<T: Resource>(&self, mut obj: T) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = obj.key();
        if self.get(&key).await?.is_some() {
            return Err(StoreError::AlreadyExists { kind: T::KIND, key });
        }
        obj.set_resource_version(1);
        let data = serde_json::to_vec(&obj)?;
        self.put(&key, &data).await?;
        Ok(obj)
    }

    /// Replace a stored object. `obj` must carry the version of the copy it was
    /// derived from; a newer stored version yields `Conflict`.
    pub async fn update_resource<T: Resource>(&self, mut obj: T) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = obj.key();
        let current: T = self
            .get_resource(&key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            })?;
        if current.resource_version() != obj.resource_version() {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                key,
                expected: obj.resource_version(),
                actual: current.resource_version(),
            });
        }
        obj.set_resource_version(current.resource_version() + 1);
        let data = serde_json::to_vec(&obj)?;
        self.put(&key, &data).await?;
        Ok(obj)
    }

    /// Remove a stored object regardless of its version.
    pub async fn delete_resource<T: Resource>(&self, obj: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = obj.key();
        if self.get(&key).await?.is_none() {
            return Err(StoreError::NotFound { kind: T::KIND, key });
        }
        self.delete(&key).await
    }

    /// Gracefully close the state store.
    pub async fn close(self) -> anyhow::Result<()> {
        info!("Closing SlateDB state store");
        self.db
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("SlateDB close failed: {}", e))
    }
}
