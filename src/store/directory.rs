// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{ObjectStore, PutRequest};
use crate::error::StoreError;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Object store backed by a directory tree; each bucket is a subdirectory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: format!("{bucket}/{key}"),
            });
        }
        Ok(self.root.join(relative))
    }

    fn map_io(bucket: &str, key: &str, path: &Path, source: std::io::Error) -> StoreError {
        if source.kind() == ErrorKind::NotFound {
            StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

#[async_trait]
impl ObjectStore for DirectoryStore {
    async fn size(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let path = self.object_path(bucket, key)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| Self::map_io(bucket, key, &path, e))?;
        Ok(metadata.len())
    }

    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        reporter: &SharedProgressReporter,
    ) -> Result<u64, StoreError> {
        let path = self.object_path(bucket, key)?;
        let total = self.size(bucket, key).await?;

        reporter.report(ProgressEvent::TransferStarting {
            key: key.to_string(),
            total_bytes: Some(total),
        });

        let bytes = tokio::fs::copy(&path, dest)
            .await
            .map_err(|e| Self::map_io(bucket, key, &path, e))?;

        reporter.report(ProgressEvent::TransferCompleted {
            key: key.to_string(),
            bytes,
        });

        Ok(bytes)
    }

    async fn fetch_bytes(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        let path = self.object_path(bucket, key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Self::map_io(bucket, key, &path, e))?;
        Ok(Bytes::from(data))
    }

    async fn put(
        &self,
        request: &PutRequest<'_>,
        _reporter: &SharedProgressReporter,
    ) -> Result<(), StoreError> {
        let path = self.object_path(request.bucket, request.key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        debug!(path = %path.display(), content_type = request.content_type, "storing object");

        tokio::fs::copy(request.source, &path)
            .await
            .map_err(|e| StoreError::Io {
                path: request.source.to_path_buf(),
                source: e,
            })?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "removing object");
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Self::map_io(bucket, key, &path, e))
    }
}
