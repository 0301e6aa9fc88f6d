use crate::backend::{ArchiveBackend, ByteReader, LIST_CHANNEL_CAPACITY};
use crate::error::ArchiveError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

/// Shared file map behind a [`MemoryBackend`]. Tests hold a second handle to
/// seed fixtures, delete artifacts and count writes while an archive is
/// connected over the same store.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    put_log: Mutex<Vec<String>>,
}

impl MemoryStore {
    /// Insert a file directly, bypassing the put log.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().remove(path)
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    pub fn dump(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Every path written through the backend, in write order.
    pub fn put_log(&self) -> Vec<String> {
        self.put_log.lock().clone()
    }

    pub fn put_count_for(&self, path: &str) -> usize {
        self.put_log.lock().iter().filter(|p| *p == path).count()
    }

    pub fn clear_put_log(&self) {
        self.put_log.lock().clear();
    }
}

/// In-memory backend for `mock://` archives and tests.
pub struct MemoryBackend {
    store: Arc<MemoryStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::with_store(Arc::new(MemoryStore::default()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        MemoryBackend { store }
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

#[async_trait]
impl ArchiveBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<ByteReader, ArchiveError> {
        match self.store.get(path) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes))),
            None => Err(ArchiveError::not_found(path)),
        }
    }

    async fn put(&self, path: &str, mut reader: ByteReader) -> Result<(), ArchiveError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|err| ArchiveError::transport(format!("reading payload for {path}"), err))?;
        self.store.files.lock().insert(path.to_string(), bytes);
        self.store.put_log.lock().push(path.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<mpsc::Receiver<String>, ArchiveError> {
        let matching: Vec<String> = {
            let files = self.store.files.lock();
            files
                .keys()
                .filter(|path| path.starts_with(prefix))
                .cloned()
                .collect()
        };
        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            for path in matching {
                if tx.send(path).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
