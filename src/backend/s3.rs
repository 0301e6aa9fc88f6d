use crate::archive::ConnectOptions;
use crate::backend::{ArchiveBackend, ByteReader, LIST_CHANNEL_CAPACITY};
use crate::error::ArchiveError;
use async_trait::async_trait;
use log::warn;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use std::io::Cursor;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

const DEFAULT_REGION: &str = "us-east-1";

/// S3-backed archive: a bucket plus an optional key prefix.
///
/// Credentials come from the environment (or anonymously for public,
/// read-only archives); the region comes from [`ConnectOptions`]. Keys never
/// carry a leading slash.
pub struct S3Backend {
    bucket: Bucket,
    prefix: String,
}

impl S3Backend {
    pub fn new(
        bucket_name: &str,
        prefix: &str,
        opts: &ConnectOptions,
    ) -> Result<Self, ArchiveError> {
        let region: Region = opts
            .s3_region
            .as_deref()
            .unwrap_or(DEFAULT_REGION)
            .parse()
            .map_err(|err| ArchiveError::transport("parsing S3 region", err))?;
        let credentials = Credentials::default()
            .or_else(|_| Credentials::anonymous())
            .map_err(|err| ArchiveError::transport("resolving S3 credentials", err))?;
        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|err| ArchiveError::transport("opening S3 bucket", err))?;
        Ok(S3Backend {
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    fn key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

#[async_trait]
impl ArchiveBackend for S3Backend {
    async fn get(&self, path: &str) -> Result<ByteReader, ArchiveError> {
        match self.bucket.get_object(self.key(path)).await {
            Ok(data) if data.status_code() == 404 => Err(ArchiveError::not_found(path)),
            Ok(data) => Ok(Box::new(Cursor::new(data.bytes().to_vec()))),
            Err(S3Error::Http(404, _)) => Err(ArchiveError::not_found(path)),
            Err(err) => Err(ArchiveError::transport(format!("fetching {path}"), err)),
        }
    }

    async fn put(&self, path: &str, mut reader: ByteReader) -> Result<(), ArchiveError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|err| ArchiveError::transport(format!("reading payload for {path}"), err))?;
        self.bucket
            .put_object(self.key(path), &bytes)
            .await
            .map_err(|err| ArchiveError::transport(format!("storing {path}"), err))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<mpsc::Receiver<String>, ArchiveError> {
        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);
        let bucket = self.bucket.clone();
        let key_prefix = self.key(prefix);
        // Keys are absolute within the bucket; strip our base prefix back off
        // so consumers see archive-relative paths.
        let strip = if self.prefix.is_empty() {
            0
        } else {
            self.prefix.len() + 1
        };
        tokio::spawn(async move {
            let mut continuation: Option<String> = None;
            loop {
                let page = bucket
                    .list_page(key_prefix.clone(), None, continuation.clone(), None, None)
                    .await;
                let (result, _status) = match page {
                    Ok(page) => page,
                    Err(err) => {
                        warn!("listing {key_prefix} failed: {err}");
                        return;
                    }
                };
                for object in result.contents {
                    let path = object.key.get(strip..).unwrap_or_default().to_string();
                    if !path.is_empty() && tx.send(path).await.is_err() {
                        return;
                    }
                }
                match result.next_continuation_token {
                    Some(token) => continuation = Some(token),
                    None => break,
                }
            }
        });
        Ok(rx)
    }
}
