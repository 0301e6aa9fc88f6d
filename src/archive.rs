//! The archive handle: a backend plus the bookkeeping that scans fill in.

use crate::backend::{ArchiveBackend, FsBackend, MemoryBackend, S3Backend};
use crate::error::ArchiveError;
use crate::has::HistoryArchiveState;
use crate::hash::Hash;
use crate::paths::{
    category_checkpoint_path, parse_bucket_path, Category, ROOT_HAS_PATH,
};
use crate::range::CheckpointRange;
use log::info;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use url::Url;

/// Fan-out of every worker pool in the crate. A tuning constant, not a
/// correctness parameter: the pools are I/O-bound and CPU-cheap.
pub(crate) const CONCURRENCY: usize = 32;

/// Connection configuration. Only the S3 backend reads any of it.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub s3_region: Option<String>,
}

/// What a scan has learned about an archive so far.
///
/// One mutex guards all three maps; every held section is a single map
/// update or a single read-and-copy. During a scan only `true` is ever
/// written into `checkpoint_files`, so the presence maps are monotone until
/// [`ScanState::clear`] resets them between passes.
#[derive(Default)]
struct ScanStateInner {
    checkpoint_files: HashMap<Category, HashMap<u32, bool>>,
    all_buckets: HashSet<Hash>,
    referenced_buckets: HashSet<Hash>,
}

pub(crate) struct ScanState {
    inner: Mutex<ScanStateInner>,
}

impl ScanState {
    fn new() -> Self {
        let mut inner = ScanStateInner::default();
        for cat in Category::ALL {
            inner.checkpoint_files.insert(cat, HashMap::new());
        }
        ScanState {
            inner: Mutex::new(inner),
        }
    }

    pub(crate) fn note_checkpoint_file(&self, cat: Category, seq: u32, present: bool) {
        let mut inner = self.inner.lock();
        inner
            .checkpoint_files
            .entry(cat)
            .or_default()
            .insert(seq, present);
    }

    pub(crate) fn note_existing_bucket(&self, bucket: Hash) {
        self.inner.lock().all_buckets.insert(bucket);
    }

    pub(crate) fn note_referenced_bucket(&self, bucket: Hash) {
        self.inner.lock().referenced_buckets.insert(bucket);
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        for cat in Category::ALL {
            inner.checkpoint_files.insert(cat, HashMap::new());
        }
        inner.all_buckets = HashSet::new();
        inner.referenced_buckets = HashSet::new();
    }

    /// Checkpoint sequences whose history manifest the scan has seen.
    pub(crate) fn history_checkpoints(&self) -> Vec<u32> {
        let inner = self.inner.lock();
        inner
            .checkpoint_files
            .get(&Category::History)
            .map(|files| {
                files
                    .iter()
                    .filter(|(_, present)| **present)
                    .map(|(seq, _)| *seq)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Missing sequences per category, computed in one atomic view so a
    /// concurrent scan cannot tear the answer.
    fn checkpoint_files_missing(&self, range: CheckpointRange) -> HashMap<Category, Vec<u32>> {
        let inner = self.inner.lock();
        let mut missing = HashMap::new();
        for cat in Category::ALL {
            let present = inner.checkpoint_files.get(&cat);
            let absent: Vec<u32> = range
                .checkpoints()
                .filter(|seq| !present.is_some_and(|files| files.contains_key(seq)))
                .collect();
            missing.insert(cat, absent);
        }
        missing
    }

    fn buckets_missing(&self) -> HashSet<Hash> {
        let inner = self.inner.lock();
        inner
            .referenced_buckets
            .difference(&inner.all_buckets)
            .copied()
            .collect()
    }

    pub(crate) fn report_checkpoint_stats(&self) {
        let inner = self.inner.lock();
        let parts: Vec<String> = Category::ALL
            .iter()
            .map(|cat| {
                let count = inner.checkpoint_files.get(cat).map_or(0, HashMap::len);
                format!("{count} {cat}")
            })
            .collect();
        info!("archive: {}", parts.join(", "));
    }

    pub(crate) fn report_bucket_stats(&self) {
        let inner = self.inner.lock();
        info!(
            "archive: {} buckets total, {} referenced",
            inner.all_buckets.len(),
            inner.referenced_buckets.len()
        );
    }
}

/// A handle on one archive: the backend it lives in plus the scan state
/// accumulated against it.
pub struct Archive {
    backend: Box<dyn ArchiveBackend>,
    state: Arc<ScanState>,
}

impl Archive {
    /// Open an archive by URL. Recognized schemes are `file://HOST/PATH`
    /// (host and path concatenated into a local root), `s3://BUCKET/PREFIX`
    /// (leading slash stripped from the prefix) and `mock://` (a fresh
    /// in-memory store). Anything else fails without instantiating a
    /// backend.
    pub fn connect(url: &str, opts: &ConnectOptions) -> Result<Self, ArchiveError> {
        let parsed =
            Url::parse(url).map_err(|err| ArchiveError::BadUrl(format!("{url}: {err}")))?;
        let backend: Box<dyn ArchiveBackend> = match parsed.scheme() {
            "file" => {
                let host = parsed.host_str().unwrap_or("");
                let root = format!("{host}{}", parsed.path());
                Box::new(FsBackend::new(root))
            }
            "s3" => {
                let bucket = parsed
                    .host_str()
                    .ok_or_else(|| ArchiveError::BadUrl(format!("{url}: missing bucket name")))?;
                let prefix = parsed.path().trim_start_matches('/');
                Box::new(S3Backend::new(bucket, prefix, opts)?)
            }
            "mock" => Box::new(MemoryBackend::new()),
            scheme => {
                return Err(ArchiveError::UnknownScheme {
                    scheme: scheme.to_string(),
                })
            }
        };
        Ok(Archive::with_backend(backend))
    }

    /// Wrap an already-constructed backend, e.g. a shared in-memory store.
    pub fn with_backend(backend: Box<dyn ArchiveBackend>) -> Self {
        Archive {
            backend,
            state: Arc::new(ScanState::new()),
        }
    }

    pub(crate) fn backend(&self) -> &dyn ArchiveBackend {
        self.backend.as_ref()
    }

    pub(crate) fn state(&self) -> Arc<ScanState> {
        self.state.clone()
    }

    pub async fn get_path_has(&self, path: &str) -> Result<HistoryArchiveState, ArchiveError> {
        let mut reader = self.backend.get(path).await?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|err| ArchiveError::transport(format!("reading {path}"), err))?;
        serde_json::from_slice(&bytes).map_err(|err| ArchiveError::decode(path, err))
    }

    pub async fn put_path_has(
        &self,
        path: &str,
        has: &HistoryArchiveState,
    ) -> Result<(), ArchiveError> {
        let bytes =
            serde_json::to_vec_pretty(has).map_err(|err| ArchiveError::encode(path, err))?;
        self.backend.put(path, Box::new(Cursor::new(bytes))).await
    }

    pub async fn get_root_has(&self) -> Result<HistoryArchiveState, ArchiveError> {
        self.get_path_has(ROOT_HAS_PATH).await
    }

    pub async fn put_root_has(&self, has: &HistoryArchiveState) -> Result<(), ArchiveError> {
        self.put_path_has(ROOT_HAS_PATH, has).await
    }

    pub async fn get_checkpoint_has(
        &self,
        seq: u32,
    ) -> Result<HistoryArchiveState, ArchiveError> {
        self.get_path_has(&category_checkpoint_path(Category::History, seq))
            .await
    }

    pub async fn put_checkpoint_has(
        &self,
        seq: u32,
        has: &HistoryArchiveState,
    ) -> Result<(), ArchiveError> {
        self.put_path_has(&category_checkpoint_path(Category::History, seq), has)
            .await
    }

    /// Lazily enumerate the hashes of every bucket present in storage. One
    /// namespace-wide listing is far cheaper than thousands of per-bucket
    /// probes. Foreign paths under `bucket/` are skipped.
    pub async fn list_all_bucket_hashes(&self) -> Result<mpsc::Receiver<Hash>, ArchiveError> {
        let mut paths = self.backend.list("bucket").await?;
        let (tx, rx) = mpsc::channel(1000);
        tokio::spawn(async move {
            while let Some(path) = paths.recv().await {
                if let Some(hash) = parse_bucket_path(&path) {
                    if tx.send(hash).await.is_err() {
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }

    pub fn note_checkpoint_file(&self, cat: Category, seq: u32, present: bool) {
        self.state.note_checkpoint_file(cat, seq, present);
    }

    pub fn note_existing_bucket(&self, bucket: Hash) {
        self.state.note_existing_bucket(bucket);
    }

    pub fn note_referenced_bucket(&self, bucket: Hash) {
        self.state.note_referenced_bucket(bucket);
    }

    /// Reset all presence sets, e.g. between the scan passes of a repair.
    pub fn clear_cached_info(&self) {
        self.state.clear();
    }

    pub fn report_checkpoint_stats(&self) {
        self.state.report_checkpoint_stats();
    }

    pub fn report_bucket_stats(&self) {
        self.state.report_bucket_stats();
    }

    /// For each category, the checkpoints in `range` whose presence the scan
    /// did not record.
    pub fn check_checkpoint_files_missing(
        &self,
        range: CheckpointRange,
    ) -> HashMap<Category, Vec<u32>> {
        self.state.checkpoint_files_missing(range)
    }

    /// Buckets referenced by a scanned manifest but absent from storage.
    pub fn check_buckets_missing(&self) -> HashSet<Hash> {
        self.state.buckets_missing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: u8) -> Hash {
        Hash::from_bytes([byte; 32])
    }

    #[test]
    fn connect_rejects_unknown_scheme() {
        let err = Archive::connect("quux://x", &ConnectOptions::default())
            .err()
            .expect("unknown scheme");
        assert!(matches!(
            err,
            ArchiveError::UnknownScheme { scheme } if scheme == "quux"
        ));
    }

    #[test]
    fn connect_rejects_garbage_urls() {
        let err = Archive::connect("not a url", &ConnectOptions::default())
            .err()
            .expect("bad URL");
        assert!(matches!(err, ArchiveError::BadUrl(_)));
    }

    #[test]
    fn connect_accepts_known_schemes() {
        let opts = ConnectOptions::default();
        assert!(Archive::connect("mock://test", &opts).is_ok());
        assert!(Archive::connect("file:///tmp/archive", &opts).is_ok());
    }

    #[tokio::test]
    async fn has_round_trip_through_mock_archive() {
        let archive =
            Archive::connect("mock://test", &ConnectOptions::default()).expect("connect");
        let has = HistoryArchiveState::new(0x3f, vec![hash(1)]);
        archive.put_root_has(&has).await.expect("put root");
        assert_eq!(archive.get_root_has().await.expect("get root"), has);

        archive
            .put_checkpoint_has(0x3f, &has)
            .await
            .expect("put checkpoint");
        assert_eq!(
            archive.get_checkpoint_has(0x3f).await.expect("get"),
            has
        );
    }

    #[tokio::test]
    async fn missing_root_has_is_not_found() {
        let archive =
            Archive::connect("mock://test", &ConnectOptions::default()).expect("connect");
        let err = archive.get_root_has().await.expect_err("missing root");
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_sets_follow_the_notes() {
        let archive =
            Archive::connect("mock://test", &ConnectOptions::default()).expect("connect");
        let range = CheckpointRange::covering(63, 191);

        archive.note_checkpoint_file(Category::Ledger, 63, true);
        archive.note_checkpoint_file(Category::Ledger, 191, true);
        let missing = archive.check_checkpoint_files_missing(range);
        assert_eq!(missing[&Category::Ledger], vec![127]);
        assert_eq!(missing[&Category::History], vec![63, 127, 191]);

        archive.note_existing_bucket(hash(1));
        archive.note_referenced_bucket(hash(1));
        archive.note_referenced_bucket(hash(2));
        let buckets = archive.check_buckets_missing();
        assert_eq!(buckets.len(), 1);
        assert!(buckets.contains(&hash(2)));

        archive.clear_cached_info();
        assert!(archive.check_buckets_missing().is_empty());
        let missing = archive.check_checkpoint_files_missing(range);
        assert_eq!(missing[&Category::Ledger], vec![63, 127, 191]);
    }
}
