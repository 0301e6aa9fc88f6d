//! Unconditional range copy from one archive to another.

use crate::archive::{Archive, CONCURRENCY};
use crate::cancel::CancelToken;
use crate::error::ArchiveError;
use crate::hash::Hash;
use crate::paths::{bucket_path, category_checkpoint_path, Category};
use crate::progress::ProgressTicker;
use crate::range::CheckpointRange;
use futures::stream::{self, TryStreamExt};
use log::info;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Mirror logs a progress line every this many copied checkpoints.
const MIRROR_SAMPLE_EVERY: usize = 256;

/// Pipe one path from `src` straight into `dst`.
pub(crate) async fn copy_path(
    src: &Archive,
    dst: &Archive,
    path: &str,
) -> Result<(), ArchiveError> {
    let reader = src.backend().get(path).await?;
    dst.backend().put(path, reader).await
}

/// Copy every checkpoint in `range` (clamped to the source root manifest)
/// from `src` to `dst`, buckets included.
///
/// Buckets are shared across checkpoints; an in-flight set keyed by hash
/// guarantees at most one copy per bucket no matter how many manifests
/// reference it. The first copy failure aborts the whole operation. The
/// destination root manifest is published last, strictly after every other
/// copy, so a partially mirrored archive is never advertised as complete.
pub async fn mirror(
    src: &Archive,
    dst: &Archive,
    range: CheckpointRange,
    cancel: &CancelToken,
) -> Result<(), ArchiveError> {
    let root = src.get_root_has().await?;
    let range = range.clamp(&root.range());
    info!("mirroring range {range}");

    let in_flight: Arc<Mutex<HashSet<Hash>>> = Arc::new(Mutex::new(HashSet::new()));
    let total = range.size();
    let progress_set = in_flight.clone();
    let ticker = ProgressTicker::spawn(MIRROR_SAMPLE_EVERY, move |count| {
        let buckets = progress_set.lock().len();
        info!(
            "copied {count}/{total} checkpoints ({:.1}%), {buckets} buckets",
            100.0 * count as f64 / total as f64
        );
    });

    let result = stream::iter(range.checkpoints().map(Ok::<u32, ArchiveError>))
        .try_for_each_concurrent(CONCURRENCY, |seq| {
            let in_flight = in_flight.clone();
            let tick = ticker.sender();
            async move {
                cancel.bail_if_cancelled()?;
                let has = src.get_checkpoint_has(seq).await?;
                for bucket in has.buckets() {
                    let first_fetch = in_flight.lock().insert(bucket);
                    if first_fetch {
                        copy_path(src, dst, &bucket_path(&bucket)).await?;
                    }
                }
                dst.put_checkpoint_has(seq, &has).await?;
                for cat in Category::ALL {
                    copy_path(src, dst, &category_checkpoint_path(cat, seq)).await?;
                }
                let _ = tick.send(()).await;
                Ok(())
            }
        })
        .await;

    ticker.finish().await;
    result?;
    cancel.bail_if_cancelled()?;
    dst.put_root_has(&root).await
}
