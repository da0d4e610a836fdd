// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use super::{ObjectStore, PutRequest};
use crate::error::StoreError;
use crate::http::{HttpClient, UploadStream};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Object store reached over plain HTTP at `<endpoint>/<bucket>/<key>`
pub struct RemoteStore<C> {
    client: C,
    endpoint: Url,
}

impl<C: HttpClient> RemoteStore<C> {
    pub fn new(client: C, endpoint: &str) -> Result<Self, StoreError> {
        let invalid = |source| StoreError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        };

        let endpoint_url = Url::parse(endpoint).map_err(invalid)?;
        if endpoint_url.cannot_be_a_base() {
            return Err(invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        Ok(Self {
            client,
            endpoint: endpoint_url,
        })
    }

    /// URL of an object; every key segment is percent-encoded
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(bucket);
            for segment in key.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        url.to_string()
    }

    fn check_status(status: u16, bucket: &str, key: &str, url: &str) -> Result<(), StoreError> {
        match status {
            404 => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            s if s >= 400 => Err(StoreError::HttpStatus {
                url: url.to_string(),
                status: s,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<C: HttpClient> ObjectStore for RemoteStore<C> {
    async fn size(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let url = self.object_url(bucket, key);
        let response = self
            .client
            .head(&url)
            .await
            .map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;

        Self::check_status(response.status, bucket, key, &url)?;
        response
            .content_length
            .ok_or(StoreError::MissingLength { url })
    }

    async fn fetch(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        reporter: &SharedProgressReporter,
    ) -> Result<u64, StoreError> {
        let url = self.object_url(bucket, key);
        debug!(%url, path = %dest.display(), "fetching object");

        let response = self
            .client
            .get_stream(&url)
            .await
            .map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;
        Self::check_status(response.status, bucket, key, &url)?;

        reporter.report(ProgressEvent::TransferStarting {
            key: key.to_string(),
            total_bytes: response.content_length,
        });

        let io_error = |source| StoreError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = File::create(dest).await.map_err(io_error)?;

        let mut bytes_transferred: u64 = 0;
        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;

            file.write_all(&chunk).await.map_err(io_error)?;
            bytes_transferred += chunk.len() as u64;

            reporter.report(ProgressEvent::TransferProgress {
                key: key.to_string(),
                bytes_transferred,
                total_bytes: response.content_length,
            });
        }

        file.flush().await.map_err(io_error)?;

        reporter.report(ProgressEvent::TransferCompleted {
            key: key.to_string(),
            bytes: bytes_transferred,
        });

        Ok(bytes_transferred)
    }

    async fn fetch_bytes(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        let url = self.object_url(bucket, key);
        let response = self
            .client
            .get_stream(&url)
            .await
            .map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;
        Self::check_status(response.status, bucket, key, &url)?;

        let mut buffer = BytesMut::new();
        let mut stream = response.body;
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer.freeze())
    }

    async fn put(
        &self,
        request: &PutRequest<'_>,
        reporter: &SharedProgressReporter,
    ) -> Result<(), StoreError> {
        let url = self.object_url(request.bucket, request.key);
        let io_error = |source| StoreError::Io {
            path: request.source.to_path_buf(),
            source,
        };

        let file = File::open(request.source).await.map_err(io_error)?;
        let size = file.metadata().await.map_err(io_error)?.len();

        debug!(%url, size, storage_class = request.storage_class, "storing object");

        let reporter = reporter.clone();
        let key = request.key.to_string();
        let mut bytes_transferred: u64 = 0;
        let body: UploadStream = Box::pin(ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                bytes_transferred += chunk.len() as u64;
                reporter.report(ProgressEvent::TransferProgress {
                    key: key.clone(),
                    bytes_transferred,
                    total_bytes: Some(size),
                });
            }
        }));

        let headers = [
            ("Content-Type", request.content_type.to_string()),
            ("x-amz-storage-class", request.storage_class.to_string()),
        ];
        let status = self
            .client
            .put(&url, body, size, &headers)
            .await
            .map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;

        Self::check_status(status, request.bucket, request.key, &url)
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let url = self.object_url(bucket, key);
        debug!(%url, "removing object");

        let status = self
            .client
            .delete(&url)
            .await
            .map_err(|e| StoreError::HttpFailed {
                url: url.clone(),
                source: e,
            })?;

        Self::check_status(status, bucket, key, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HeadResponse, HttpResponse};
    use crate::progress::NoopReporter;
    use crate::progress::recording::RecordingReporter;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory HTTP object server
    #[derive(Default)]
    struct MockHttpClient {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        puts: Mutex<Vec<(String, Vec<(String, String)>)>>,
        omit_length: bool,
    }

    impl MockHttpClient {
        fn with_object(url: &str, data: &[u8]) -> Self {
            let client = Self::default();
            client
                .objects
                .lock()
                .unwrap()
                .insert(url.to_string(), data.to_vec());
            client
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.objects.lock().unwrap().get(url).cloned();
            match data {
                Some(data) => {
                    let len = data.len() as u64;
                    let (head, tail) = data.split_at(data.len() / 2);
                    let chunks = vec![
                        Ok(Bytes::copy_from_slice(head)),
                        Ok(Bytes::copy_from_slice(tail)),
                    ];
                    let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
                    Ok(HttpResponse {
                        status: 200,
                        content_length: Some(len),
                        body: stream,
                    })
                }
                None => Ok(HttpResponse {
                    status: 404,
                    content_length: None,
                    body: Box::pin(futures::stream::empty()),
                }),
            }
        }

        async fn head(&self, url: &str) -> Result<HeadResponse, reqwest::Error> {
            let len = self.objects.lock().unwrap().get(url).map(|d| d.len() as u64);
            Ok(match len {
                Some(len) => HeadResponse {
                    status: 200,
                    content_length: if self.omit_length { None } else { Some(len) },
                },
                None => HeadResponse {
                    status: 404,
                    content_length: None,
                },
            })
        }

        async fn put(
            &self,
            url: &str,
            mut body: UploadStream,
            content_length: u64,
            headers: &[(&'static str, String)],
        ) -> Result<u16, reqwest::Error> {
            let mut data = Vec::new();
            while let Some(chunk) = body.next().await {
                data.extend_from_slice(&chunk.unwrap());
            }
            assert_eq!(data.len() as u64, content_length);

            self.objects.lock().unwrap().insert(url.to_string(), data);
            self.puts.lock().unwrap().push((
                url.to_string(),
                headers
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.clone()))
                    .collect(),
            ));
            Ok(200)
        }

        async fn delete(&self, url: &str) -> Result<u16, reqwest::Error> {
            match self.objects.lock().unwrap().remove(url) {
                Some(_) => Ok(204),
                None => Ok(404),
            }
        }
    }

    // === Addressing tests ===

    #[test]
    fn object_url_joins_endpoint_bucket_and_key() {
        let store = RemoteStore::new(MockHttpClient::default(), "https://s3.example.com").unwrap();
        assert_eq!(
            store.object_url("masters", "season 1/ep1.wav"),
            "https://s3.example.com/masters/season%201/ep1.wav"
        );
    }

    #[test]
    fn object_url_keeps_endpoint_path() {
        let store =
            RemoteStore::new(MockHttpClient::default(), "https://example.com/storage/").unwrap();
        assert_eq!(
            store.object_url("out", "ep1.mp3"),
            "https://example.com/storage/out/ep1.mp3"
        );
    }

    #[test]
    fn rejects_unusable_endpoints() {
        assert!(matches!(
            RemoteStore::new(MockHttpClient::default(), "not a url"),
            Err(StoreError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            RemoteStore::new(MockHttpClient::default(), "mailto:someone@example.com"),
            Err(StoreError::InvalidEndpoint { .. })
        ));
    }

    // === Transfer tests ===

    #[tokio::test]
    async fn size_reads_content_length() {
        let client = MockHttpClient::with_object("https://s3.example.com/in/ep1.wav", b"12345");
        let store = RemoteStore::new(client, "https://s3.example.com").unwrap();

        assert_eq!(store.size("in", "ep1.wav").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn size_of_missing_object_is_not_found() {
        let store = RemoteStore::new(MockHttpClient::default(), "https://s3.example.com").unwrap();

        let err = store.size("in", "missing.wav").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn size_without_length_is_an_error() {
        let mut client = MockHttpClient::with_object("https://s3.example.com/in/ep1.wav", b"1");
        client.omit_length = true;
        let store = RemoteStore::new(client, "https://s3.example.com").unwrap();

        let err = store.size("in", "ep1.wav").await.unwrap_err();
        assert!(matches!(err, StoreError::MissingLength { .. }));
    }

    #[tokio::test]
    async fn fetch_streams_body_to_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("ep1.wav");
        let client =
            MockHttpClient::with_object("https://s3.example.com/in/ep1.wav", b"test audio content");
        let store = RemoteStore::new(client, "https://s3.example.com").unwrap();

        let bytes = store
            .fetch("in", "ep1.wav", &dest, &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(bytes, 18);
        assert_eq!(std::fs::read(&dest).unwrap(), b"test audio content");
    }

    #[tokio::test]
    async fn fetch_missing_object_creates_no_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("ep1.wav");
        let store = RemoteStore::new(MockHttpClient::default(), "https://s3.example.com").unwrap();

        let err = store
            .fetch("in", "ep1.wav", &dest, &NoopReporter::shared())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn put_sends_type_and_storage_class() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("ep1.mp3");
        std::fs::write(&source, b"mp3 data").unwrap();

        let store = RemoteStore::new(MockHttpClient::default(), "https://s3.example.com").unwrap();
        store
            .put(
                &PutRequest {
                    bucket: "out",
                    key: "ep1.mp3",
                    source: &source,
                    content_type: "audio/mpeg",
                    storage_class: "STANDARD_IA",
                },
                &NoopReporter::shared(),
            )
            .await
            .unwrap();

        let bytes = store.fetch_bytes("out", "ep1.mp3").await.unwrap();
        assert_eq!(&bytes[..], b"mp3 data");

        let puts = store.client.puts.lock().unwrap();
        let (url, headers) = &puts[0];
        assert_eq!(url, "https://s3.example.com/out/ep1.mp3");
        assert!(headers.contains(&("Content-Type".to_string(), "audio/mpeg".to_string())));
        assert!(headers.contains(&("x-amz-storage-class".to_string(), "STANDARD_IA".to_string())));
    }

    #[tokio::test]
    async fn put_streams_file_and_reports_progress() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("ep1.mp4");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&source, &data).unwrap();

        let reporter = RecordingReporter::shared();
        let shared: SharedProgressReporter = reporter.clone();
        let store = RemoteStore::new(MockHttpClient::default(), "https://s3.example.com").unwrap();
        store
            .put(
                &PutRequest {
                    bucket: "out",
                    key: "ep1.mp4",
                    source: &source,
                    content_type: "video/mp4",
                    storage_class: "STANDARD",
                },
                &shared,
            )
            .await
            .unwrap();

        let stored = store.fetch_bytes("out", "ep1.mp4").await.unwrap();
        assert_eq!(&stored[..], &data[..]);

        let events = reporter.events.lock().unwrap();
        let progress: Vec<u64> = events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::TransferProgress {
                    bytes_transferred,
                    total_bytes,
                    ..
                } => {
                    assert_eq!(*total_bytes, Some(10_000));
                    Some(*bytes_transferred)
                }
                _ => None,
            })
            .collect();
        assert!(progress.len() > 1, "expected several chunks, got {progress:?}");
        assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(progress.last(), Some(&10_000));
    }

    #[tokio::test]
    async fn put_of_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let store = RemoteStore::new(MockHttpClient::default(), "https://s3.example.com").unwrap();

        let err = store
            .put(
                &PutRequest {
                    bucket: "out",
                    key: "ep1.mp3",
                    source: &dir.path().join("missing.mp3"),
                    content_type: "audio/mpeg",
                    storage_class: "STANDARD",
                },
                &NoopReporter::shared(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.client.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_object_and_maps_404() {
        let client = MockHttpClient::with_object("https://s3.example.com/in/ep1.wav", b"master");
        let store = RemoteStore::new(client, "https://s3.example.com").unwrap();

        store.remove("in", "ep1.wav").await.unwrap();

        assert!(matches!(
            store.size("in", "ep1.wav").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.remove("in", "ep1.wav").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
