use crate::backend::{ArchiveBackend, ByteReader, LIST_CHANNEL_CAPACITY};
use crate::error::ArchiveError;
use async_trait::async_trait;
use log::warn;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

/// Filesystem-backed archive rooted at a local directory.
///
/// Archive paths use forward slashes regardless of the host OS; they are
/// joined onto the root with native separators internally and converted back
/// when listing.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBackend { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        full.extend(path.split('/'));
        full
    }
}

fn relative_archive_path(root: &Path, full: &Path) -> Option<String> {
    let rel = full.strip_prefix(root).ok()?;
    let components: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(components.join("/"))
}

#[async_trait]
impl ArchiveBackend for FsBackend {
    async fn get(&self, path: &str) -> Result<ByteReader, ArchiveError> {
        match File::open(self.full_path(path)).await {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(ArchiveError::not_found(path))
            }
            Err(err) => Err(ArchiveError::transport(format!("opening {path}"), err)),
        }
    }

    async fn put(&self, path: &str, mut reader: ByteReader) -> Result<(), ArchiveError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            create_dir_all(parent)
                .await
                .map_err(|err| ArchiveError::transport(format!("creating parent of {path}"), err))?;
        }
        let file = File::create(&full)
            .await
            .map_err(|err| ArchiveError::transport(format!("creating {path}"), err))?;
        let mut writer = BufWriter::new(file);
        tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|err| ArchiveError::transport(format!("writing {path}"), err))?;
        writer
            .flush()
            .await
            .map_err(|err| ArchiveError::transport(format!("flushing {path}"), err))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<mpsc::Receiver<String>, ArchiveError> {
        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);
        let root = self.root.clone();
        let start = self.full_path(prefix);
        tokio::task::spawn_blocking(move || {
            let mut stack = vec![start];
            while let Some(dir) = stack.pop() {
                let entries = match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    // A missing prefix is an empty listing; anything else is
                    // logged and the subtree skipped.
                    Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        warn!("skipping unreadable directory {}: {err}", dir.display());
                        continue;
                    }
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        stack.push(path);
                    } else if let Some(rel) = relative_archive_path(&root, &path) {
                        if tx.blocking_send(rel).is_err() {
                            return;
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}
