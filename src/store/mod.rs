// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod directory;
mod remote;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;
use crate::progress::SharedProgressReporter;

pub use directory::DirectoryStore;
pub use remote::RemoteStore;

/// An object to be stored
#[derive(Debug, Clone, Copy)]
pub struct PutRequest<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub source: &'a Path,
    pub content_type: &'a str,
    pub storage_class: &'a str,
}

/// Bucket/key addressed storage for masters and published artifacts
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the object in bytes; [`StoreError::NotFound`] if it is absent
    async fn size(&self, bucket: &str, key: &str) -> Result<u64, StoreError>;

    /// Write the object to `dest`, returning the number of bytes written
    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        reporter: &SharedProgressReporter,
    ) -> Result<u64, StoreError>;

    /// Read the whole object into memory
    async fn fetch_bytes(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError>;

    /// Store a local file, replacing any existing object
    async fn put(
        &self,
        request: &PutRequest<'_>,
        reporter: &SharedProgressReporter,
    ) -> Result<(), StoreError>;

    /// Delete the object; [`StoreError::NotFound`] if it is absent
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// A shared reference to an object store
pub type SharedStore = Arc<dyn ObjectStore>;

/// Whether a storage endpoint names an HTTP service rather than a directory
pub fn is_remote_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}
