// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use similar::TextDiff;
use tracing::{debug, info, warn};

use crate::confirm::SharedConfirm;
use crate::error::SyncError;
use crate::media;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::spec::DEFAULT_STORAGE_CLASS;
use crate::store::{PutRequest, SharedStore};

/// Suffix of in-flight downloads
const PARTIAL_SUFFIX: &str = ".partial";

/// What a download did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The object was transferred; carries the byte count
    Fetched(u64),
    /// The local copy already had the remote size
    UpToDate(u64),
    /// The remote object is absent and the local copy was kept
    LocalOnly,
    /// The remote object was absent and the local copy was uploaded
    UploadedLocal(u64),
}

/// Result of comparing a remote object with a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    RemoteMissing,
    Identical,
    /// Unified diff from the remote to the local content
    Changed(String),
}

/// Moves files between the local staging directory and an object store
pub struct SyncEngine {
    store: SharedStore,
    local_dir: PathBuf,
    confirm: SharedConfirm,
    reporter: SharedProgressReporter,
}

impl SyncEngine {
    pub fn new(
        store: SharedStore,
        local_dir: impl Into<PathBuf>,
        confirm: SharedConfirm,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            store,
            local_dir: local_dir.into(),
            confirm,
            reporter,
        }
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Where `key` lives in the staging directory
    pub fn local_path(&self, key: &str) -> PathBuf {
        self.local_dir.join(key)
    }

    /// Size of the remote object
    pub async fn remote_size(&self, bucket: &str, key: &str) -> Result<u64, SyncError> {
        Ok(self.store.size(bucket, key).await?)
    }

    /// Make the local copy of `bucket/key` match the remote object.
    ///
    /// Only transfers when the local copy is missing or its size differs.
    pub async fn download(&self, bucket: &str, key: &str) -> Result<DownloadOutcome, SyncError> {
        let local = self.local_path(key);

        if tokio::fs::try_exists(&local).await.unwrap_or(false) {
            let local_size = tokio::fs::metadata(&local)
                .await
                .map_err(|e| SyncError::ReadFailed {
                    path: local.clone(),
                    source: e,
                })?
                .len();

            let remote_size = match self.store.size(bucket, key).await.map_err(SyncError::from) {
                Ok(size) => size,
                Err(err) if err.is_remote_not_found() => {
                    return self.offer_upload(bucket, key, &local).await;
                }
                Err(err) => return Err(err),
            };

            if remote_size == local_size {
                debug!(bucket, key, size = local_size, "local copy is up to date");
                self.reporter.report(ProgressEvent::TransferSkipped {
                    key: key.to_string(),
                });
                return Ok(DownloadOutcome::UpToDate(local_size));
            }

            info!(bucket, key, local_size, remote_size, "replacing stale local copy");
            tokio::fs::remove_file(&local)
                .await
                .map_err(|e| SyncError::ReplaceFailed {
                    path: local.clone(),
                    source: e,
                })?;
        }

        let bytes = self.transfer(bucket, key, &local).await?;
        Ok(DownloadOutcome::Fetched(bytes))
    }

    async fn offer_upload(
        &self,
        bucket: &str,
        key: &str,
        local: &Path,
    ) -> Result<DownloadOutcome, SyncError> {
        warn!(bucket, key, "remote object missing, keeping local copy");

        let question = format!("{bucket}/{key} only exists locally. Upload it?");
        if !self.confirm.ask(&question).await {
            return Ok(DownloadOutcome::LocalOnly);
        }

        let bytes = self.upload(bucket, key, local, None, None).await?;
        Ok(DownloadOutcome::UploadedLocal(bytes))
    }

    async fn transfer(&self, bucket: &str, key: &str, local: &Path) -> Result<u64, SyncError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::CreateDirectoryFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let partial = partial_path(local);
        let result = self
            .store
            .fetch(bucket, key, &partial, &self.reporter)
            .await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(err.into());
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, local).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(SyncError::ReplaceFailed {
                path: local.to_path_buf(),
                source: e,
            });
        }

        info!(bucket, key, size = bytes, "downloaded");
        Ok(bytes)
    }

    /// Store a local file at `bucket/key`, replacing whatever is there.
    ///
    /// The content type is sniffed when not given; the storage class
    /// defaults to `STANDARD`.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        local: &Path,
        content_type: Option<&str>,
        storage_class: Option<&str>,
    ) -> Result<u64, SyncError> {
        let size = tokio::fs::metadata(local)
            .await
            .map_err(|e| SyncError::ReadFailed {
                path: local.to_path_buf(),
                source: e,
            })?
            .len();

        let content_type = match content_type {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => media::sniff_content_type(local).await?,
        };
        let storage_class = storage_class
            .filter(|class| !class.is_empty())
            .unwrap_or(DEFAULT_STORAGE_CLASS);

        self.reporter.report(ProgressEvent::TransferStarting {
            key: key.to_string(),
            total_bytes: Some(size),
        });

        self.store
            .put(
                &PutRequest {
                    bucket,
                    key,
                    source: local,
                    content_type: &content_type,
                    storage_class,
                },
                &self.reporter,
            )
            .await?;

        self.reporter.report(ProgressEvent::TransferCompleted {
            key: key.to_string(),
            bytes: size,
        });
        info!(bucket, key, size, content_type = %content_type, storage_class, "uploaded");

        Ok(size)
    }

    /// Delete `bucket/key`. Returns whether there was anything to delete.
    pub async fn remove_remote(&self, bucket: &str, key: &str) -> Result<bool, SyncError> {
        match self.store.remove(bucket, key).await.map_err(SyncError::from) {
            Ok(()) => {
                info!(bucket, key, "removed remote object");
                Ok(true)
            }
            Err(err) if err.is_remote_not_found() => {
                debug!(bucket, key, "remote object already absent");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Compare the remote object with a local file, line by line
    pub async fn diff(&self, bucket: &str, key: &str, local: &Path) -> Result<DiffOutcome, SyncError> {
        let remote = match self.store.fetch_bytes(bucket, key).await.map_err(SyncError::from) {
            Ok(bytes) => bytes,
            Err(err) if err.is_remote_not_found() => return Ok(DiffOutcome::RemoteMissing),
            Err(err) => return Err(err),
        };

        let local_bytes = tokio::fs::read(local)
            .await
            .map_err(|e| SyncError::ReadFailed {
                path: local.to_path_buf(),
                source: e,
            })?;

        if remote[..] == local_bytes[..] {
            return Ok(DiffOutcome::Identical);
        }

        let old = String::from_utf8_lossy(&remote);
        let new = String::from_utf8_lossy(&local_bytes);
        let remote_label = format!("{bucket}/{key}");
        let local_label = local.display().to_string();

        let diff = TextDiff::from_lines(old.as_ref(), new.as_ref())
            .unified_diff()
            .context_radius(3)
            .header(&remote_label, &local_label)
            .to_string();

        Ok(DiffOutcome::Changed(diff))
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
