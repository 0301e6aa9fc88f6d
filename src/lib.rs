//! Maintenance engine for ledger history archives.
//!
//! A history archive is an immutable snapshot of ledger evolution stored as
//! a flat key/value space in an object store: per-checkpoint artifact files
//! in five categories, content-addressed bucket blobs, and a manifest per
//! checkpoint (plus a well-known root manifest) naming the live bucket set.
//! This crate enumerates such archives, detects artifacts missing relative
//! to the manifests, mirrors a contiguous checkpoint range between archives,
//! and repairs a damaged archive by copying only what is missing from a
//! known-good source.
//!
//! Contents are treated as opaque byte streams: the canonical path is the
//! identifier, and nothing here parses or hashes payloads. Mirrors and
//! repairs are idempotent path-level copies.
#![deny(unreachable_pub)]
#![deny(unused_must_use)]

pub mod archive;
pub mod backend;
pub mod cancel;
pub mod error;
pub mod has;
pub mod hash;
pub mod mirror;
pub mod paths;
mod progress;
pub mod range;
pub mod repair;
pub mod scan;

pub use archive::{Archive, ConnectOptions};
pub use backend::{ArchiveBackend, ByteReader, FsBackend, MemoryBackend, MemoryStore, S3Backend};
pub use cancel::CancelToken;
pub use error::ArchiveError;
pub use has::HistoryArchiveState;
pub use hash::Hash;
pub use mirror::mirror;
pub use paths::{
    bucket_path, category_checkpoint_path, parse_bucket_path, parse_checkpoint_path, Category,
    DirPrefix, ROOT_HAS_PATH,
};
pub use range::{
    checkpoint_containing, is_checkpoint, prev_checkpoint, CheckpointRange, CHECKPOINT_FREQUENCY,
};
pub use repair::{repair, report_missing, MissingReport};
