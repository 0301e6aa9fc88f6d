//! Shared fixtures: archives over an inspectable in-memory store.

use archivist::{
    bucket_path, category_checkpoint_path, Archive, Category, Hash, HistoryArchiveState,
    MemoryBackend, MemoryStore,
};
use std::sync::Arc;

/// A hash whose 32 bytes are all `byte`.
pub fn hash(byte: u8) -> Hash {
    Hash::from_bytes([byte; 32])
}

/// An archive connected over a store the test keeps a handle to, so
/// fixtures can be seeded and artifacts deleted behind the archive's back.
pub struct MockArchive {
    pub archive: Archive,
    pub store: Arc<MemoryStore>,
}

impl MockArchive {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let archive = Archive::with_backend(Box::new(MemoryBackend::with_store(store.clone())));
        MockArchive { archive, store }
    }

    /// Publish a root manifest covering everything up to `current_ledger`.
    pub async fn set_root(&self, current_ledger: u32) {
        let root = HistoryArchiveState::new(current_ledger, Vec::new());
        self.archive.put_root_has(&root).await.expect("seed root");
    }

    /// Seed one complete checkpoint: its history manifest referencing
    /// `buckets`, artifact files in the other four categories, and the
    /// bucket blobs themselves.
    pub async fn seed_checkpoint(&self, seq: u32, buckets: &[Hash]) {
        let has = HistoryArchiveState::new(seq, buckets.to_vec());
        self.archive
            .put_checkpoint_has(seq, &has)
            .await
            .expect("seed checkpoint manifest");
        for cat in [
            Category::Ledger,
            Category::Transactions,
            Category::Results,
            Category::Scp,
        ] {
            self.store.insert(
                category_checkpoint_path(cat, seq),
                format!("{cat}-{seq:08x}").into_bytes(),
            );
        }
        for bucket in buckets {
            self.store
                .insert(bucket_path(bucket), format!("bucket-{bucket}").into_bytes());
        }
    }

    /// Forget which writes happened during fixture setup.
    pub fn reset_put_log(&self) {
        self.store.clear_put_log();
    }
}
