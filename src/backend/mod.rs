//! Abstract object store underneath an archive.
//!
//! The three backends differ only in transport: a local directory tree, an
//! S3 bucket, and an in-memory map for tests. All of them expose the same
//! flat path space with forward-slash separators.

mod fs;
mod memory;
mod s3;

pub use fs::FsBackend;
pub use memory::{MemoryBackend, MemoryStore};
pub use s3::S3Backend;

use crate::error::ArchiveError;
use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// An owned byte stream handed across the backend boundary.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Listing channels hold up to this many paths before producers block.
pub(crate) const LIST_CHANNEL_CAPACITY: usize = 1000;

#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Open `path` for reading. The caller owns the stream.
    async fn get(&self, path: &str) -> Result<ByteReader, ArchiveError>;

    /// Write `reader` to `path`, creating intermediate directories or key
    /// prefixes as needed. Overwrites are silent.
    async fn put(&self, path: &str, reader: ByteReader) -> Result<(), ArchiveError>;

    /// Lazily enumerate the full paths under `prefix`. Paths arrive as they
    /// are discovered and the channel closes to signal completion; a missing
    /// prefix is an empty listing, not an error. Ordering is unspecified.
    async fn list(&self, prefix: &str) -> Result<mpsc::Receiver<String>, ArchiveError>;
}
