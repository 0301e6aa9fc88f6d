//! Targeted restoration of a damaged archive from a known-good source.

use crate::archive::Archive;
use crate::cancel::CancelToken;
use crate::error::ArchiveError;
use crate::hash::Hash;
use crate::mirror::copy_path;
use crate::paths::{bucket_path, category_checkpoint_path, Category};
use crate::range::CheckpointRange;
use log::info;
use std::collections::{HashMap, HashSet};

/// Copy into `dst` exactly the artifacts its scan shows missing over
/// `range` (clamped to the destination root manifest).
///
/// Checkpoint files are repaired first. When that restores any history
/// manifest, the presence sets are reset and the checkpoint scan re-run:
/// the restored manifests may reference buckets the first pass never saw.
/// Bucket repair then runs against the refreshed scan. The destination root
/// manifest is never rewritten; it is authoritative for the range being
/// repaired.
pub async fn repair(
    src: &Archive,
    dst: &Archive,
    range: CheckpointRange,
    cancel: &CancelToken,
) -> Result<(), ArchiveError> {
    let root = dst.get_root_has().await?;
    let range = range.clamp(&root.range());

    info!("starting scan for repair of range {range}");
    dst.scan_checkpoints(range, cancel).await?;

    info!("examining checkpoint files for gaps");
    let missing = dst.check_checkpoint_files_missing(range);

    let mut repaired_history = false;
    for cat in Category::ALL {
        for seq in missing.get(&cat).map(Vec::as_slice).unwrap_or_default() {
            cancel.bail_if_cancelled()?;
            let path = category_checkpoint_path(cat, *seq);
            info!("repairing {path}");
            copy_path(src, dst, &path).await?;
            if cat == Category::History {
                repaired_history = true;
            }
        }
    }

    if repaired_history {
        info!("re-running checkpoint scan for bucket repair");
        dst.clear_cached_info();
        dst.scan_checkpoints(range, cancel).await?;
    }

    dst.scan_buckets(cancel).await?;

    info!("examining buckets referenced by checkpoints");
    for bucket in dst.check_buckets_missing() {
        cancel.bail_if_cancelled()?;
        let path = bucket_path(&bucket);
        info!("repairing {path}");
        copy_path(src, dst, &path).await?;
    }

    Ok(())
}

/// Everything a scan found absent from an archive.
#[derive(Debug)]
pub struct MissingReport {
    /// Missing checkpoint sequences per category, including optional ones.
    pub checkpoint_files: HashMap<Category, Vec<u32>>,
    /// Referenced buckets absent from storage.
    pub buckets: HashSet<Hash>,
}

impl MissingReport {
    /// Whether every required artifact in the range was present. Gaps in
    /// optional categories do not count against completeness.
    pub fn is_complete(&self) -> bool {
        let files_complete = self
            .checkpoint_files
            .iter()
            .all(|(cat, missing)| !cat.is_required() || missing.is_empty());
        files_complete && self.buckets.is_empty()
    }
}

/// Diagnostic variant of [`repair`]: scan `archive` over `range` and log
/// every missing artifact without copying anything. Gaps in optional
/// categories are never reported.
pub async fn report_missing(
    archive: &Archive,
    range: CheckpointRange,
    cancel: &CancelToken,
) -> Result<MissingReport, ArchiveError> {
    let root = archive.get_root_has().await?;
    let range = range.clamp(&root.range());

    archive.scan(range, cancel).await?;

    info!("examining checkpoint files for gaps");
    let checkpoint_files = archive.check_checkpoint_files_missing(range);
    let mut any_files_missing = false;
    for cat in Category::ALL {
        if !cat.is_required() {
            continue;
        }
        let missing = checkpoint_files.get(&cat).map(Vec::as_slice).unwrap_or_default();
        if !missing.is_empty() {
            any_files_missing = true;
            let rendered: Vec<String> =
                missing.iter().map(|seq| format!("0x{seq:08x}")).collect();
            info!("missing {cat}: {}", rendered.join(", "));
        }
    }
    if !any_files_missing {
        info!("no checkpoint files missing in range {range}");
    }

    info!("examining buckets referenced by checkpoints");
    let buckets = archive.check_buckets_missing();
    for bucket in &buckets {
        info!("missing bucket: {bucket}");
    }
    if buckets.is_empty() {
        info!("no missing buckets referenced in range {range}");
    }

    Ok(MissingReport {
        checkpoint_files,
        buckets,
    })
}
