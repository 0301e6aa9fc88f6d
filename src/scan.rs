//! Concurrent enumeration of an archive's contents.
//!
//! Scans populate the archive's presence sets by listing the backend: one
//! listing job per (category, directory shard) for checkpoint files, plus a
//! single namespace-wide listing and a manifest-fetch pool for buckets.

use crate::archive::{Archive, CONCURRENCY};
use crate::cancel::CancelToken;
use crate::error::ArchiveError;
use crate::paths::{parse_checkpoint_path, Category, DirPrefix};
use crate::progress::ProgressTicker;
use crate::range::CheckpointRange;
use futures::stream::{self, StreamExt};
use log::{info, warn};
use tokio::sync::mpsc;

/// Scans log a stats line roughly every this many recorded artifacts.
const SCAN_SAMPLE_EVERY: usize = 4096;

impl Archive {
    /// Populate the per-category checkpoint presence sets for `range`
    /// (clamped to the root manifest's range).
    ///
    /// Listing failures do not abort the other workers; their results are
    /// idempotent and harmless, so errors are funneled aside and the first
    /// one is returned once the pool drains.
    pub async fn scan_checkpoints(
        &self,
        range: CheckpointRange,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        let root = self.get_root_has().await?;
        let range = range.clamp(&root.range());
        info!("scanning checkpoint files in range {range}");

        let state = self.state();
        let ticker = ProgressTicker::spawn(SCAN_SAMPLE_EVERY, move |_| {
            state.report_checkpoint_stats();
        });

        let jobs: Vec<(Category, DirPrefix)> = Category::ALL
            .into_iter()
            .flat_map(|cat| range.prefixes().into_iter().map(move |prefix| (cat, prefix)))
            .collect();
        let (err_tx, mut err_rx) = mpsc::channel::<ArchiveError>(jobs.len().max(1));

        stream::iter(jobs)
            .for_each_concurrent(CONCURRENCY, |(cat, prefix)| {
                let err_tx = err_tx.clone();
                let tick = ticker.sender();
                async move {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match self.backend().list(&format!("{cat}/{prefix}")).await {
                        Ok(mut paths) => {
                            while let Some(path) = paths.recv().await {
                                if cancel.is_cancelled() {
                                    return;
                                }
                                if let Some(seq) = parse_checkpoint_path(cat, &path) {
                                    self.note_checkpoint_file(cat, seq, true);
                                    let _ = tick.send(()).await;
                                }
                            }
                        }
                        Err(err) => {
                            let _ = err_tx.send(err).await;
                        }
                    }
                }
            })
            .await;

        drop(err_tx);
        ticker.finish().await;
        info!("checkpoint files scanned");
        self.report_checkpoint_stats();
        cancel.bail_if_cancelled()?;
        match err_rx.recv().await {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Record every bucket present in storage and every bucket referenced by
    /// a scanned checkpoint manifest.
    ///
    /// A manifest that cannot be fetched or decoded is logged and skipped:
    /// reference tracking treats that checkpoint as absent.
    pub async fn scan_buckets(&self, cancel: &CancelToken) -> Result<(), ArchiveError> {
        let seqs = self.state().history_checkpoints();
        info!(
            "scanning all buckets, and those referenced by {} checkpoints",
            seqs.len()
        );

        let state = self.state();
        let ticker = ProgressTicker::spawn(SCAN_SAMPLE_EVERY, move |_| {
            state.report_bucket_stats();
        });

        let mut existing = self.list_all_bucket_hashes().await?;
        let existing_tick = ticker.sender();
        let record_existing = async {
            while let Some(bucket) = existing.recv().await {
                if cancel.is_cancelled() {
                    return;
                }
                self.note_existing_bucket(bucket);
                let _ = existing_tick.send(()).await;
            }
        };

        let record_referenced = stream::iter(seqs).for_each_concurrent(CONCURRENCY, |seq| {
            let tick = ticker.sender();
            async move {
                if cancel.is_cancelled() {
                    return;
                }
                match self.get_checkpoint_has(seq).await {
                    Ok(has) => {
                        for bucket in has.buckets() {
                            self.note_referenced_bucket(bucket);
                        }
                    }
                    Err(err) => {
                        warn!("skipping checkpoint 0x{seq:08x} during bucket scan: {err}");
                    }
                }
                let _ = tick.send(()).await;
            }
        });

        tokio::join!(record_existing, record_referenced);
        ticker.finish().await;
        self.report_bucket_stats();
        cancel.bail_if_cancelled()
    }

    /// Full scan: checkpoint files, then buckets.
    pub async fn scan(
        &self,
        range: CheckpointRange,
        cancel: &CancelToken,
    ) -> Result<(), ArchiveError> {
        self.scan_checkpoints(range, cancel).await?;
        self.scan_buckets(cancel).await
    }
}
