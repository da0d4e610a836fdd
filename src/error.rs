// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or saving the podcast specification
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Failed to read specification {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write specification {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse specification {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize specification: {0}")]
    SerializeFailed(#[from] serde_yaml::Error),

    #[error("Cannot expand '~' in {path}: no home directory")]
    HomeDirectoryUnavailable { path: String },
}

/// Problems with the specification that must be fixed before anything runs
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Podcast {field} must not be empty")]
    MissingPodcastField { field: &'static str },

    #[error("Episode #{index} has no positive uid")]
    InvalidUid { index: usize },

    #[error("Episode uid {uid} is used more than once")]
    DuplicateUid { uid: u64 },

    #[error("Episode {uid} has no {field}")]
    MissingEpisodeField { uid: u64, field: &'static str },

    #[error("Episode {uid} has no input file")]
    MissingInput { uid: u64 },

    #[error("Episode {uid} has no output file")]
    MissingOutput { uid: u64 },

    #[error("Episode {uid} has no image and no default podcast image is configured")]
    MissingImage { uid: u64 },

    #[error("{name} executable not found or not executable: {path}")]
    Executable { name: &'static str, path: String },
}

/// Errors raised by an object store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object {bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },

    #[error("Invalid storage endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("No content length reported for {url}")]
    MissingLength { url: String },

    #[error("Invalid object key '{key}'")]
    InvalidKey { key: String },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while moving files between local storage and a store
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote object {bucket}/{key} does not exist")]
    RemoteNotFound { bucket: String, key: String },

    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace {path}: {source}")]
    ReplaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to detect content type: {0}")]
    ContentType(#[from] ProbeError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { bucket, key } => SyncError::RemoteNotFound { bucket, key },
            other => SyncError::Store(other),
        }
    }
}

impl SyncError {
    /// Whether the error means the remote object is absent
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, SyncError::RemoteNotFound { .. })
    }
}

/// Errors that can occur while running an external program
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for `{command}`: {source}")]
    WaitFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    ExitFailure { command: String, status: String },

    #[error("`{command}` produced output that is not UTF-8")]
    InvalidOutput { command: String },
}

/// Errors in rendering a command template
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown placeholder '{{{{{name}}}}}' in command template")]
    UnknownPlaceholder { name: String },

    #[error("Unclosed placeholder at offset {offset} in command template")]
    Unclosed { offset: usize },

    #[error("Value for '{name}' cannot be quoted for the shell")]
    Unquotable { name: String },
}

/// A declared episode format no pipeline can produce
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported episode format '{format}'")]
pub struct UnsupportedFormat {
    pub format: String,
}

/// Errors that can occur while inspecting a media file
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No movie header (moov/mvhd) found in {path}")]
    MissingMovieHeader { path: PathBuf },

    #[error("Malformed MPEG-4 structure in {path}: {reason}")]
    MalformedContainer { path: PathBuf, reason: String },

    #[error("Failed to read audio properties of {path}: {source}")]
    Audio {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("Media prober failed for {path}: {source}")]
    Prober {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("Unreadable prober output for {path}: {source}")]
    ProberOutput {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No usable duration reported for {path}")]
    MissingDuration { path: PathBuf },

    #[error("Prober command: {0}")]
    Command(#[from] TemplateError),

    #[error("Reading {path} did not finish: {source}")]
    Interrupted {
        path: PathBuf,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Errors that can occur while encoding an episode
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFormat),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Encoder failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Input '{input}' has no usable file name")]
    InvalidInput { input: String },

    #[error("Failed to remove previous output {path}: {source}")]
    StaleOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder finished but {path} was not produced")]
    MissingOutput { path: PathBuf },

    #[error("Failed to write metadata file {path}: {source}")]
    MetadataWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to tag {path}: {source}")]
    TagFailed {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },

    #[error("Tagging {path} did not finish: {source}")]
    TagInterrupted {
        path: PathBuf,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Errors from cleaning up raw recordings
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("No media files to process")]
    NoInputs,

    #[error("Unknown preset '{name}'")]
    UnknownPreset { name: String },

    #[error("{path} has no file name")]
    InvalidInput { path: PathBuf },

    #[error("Preprocessing command: {0}")]
    Template(#[from] TemplateError),

    #[error("Unable to preprocess {path}: {source}")]
    Tool {
        path: PathBuf,
        #[source]
        source: ToolError,
    },
}

/// Errors that abort processing of a single episode
#[derive(Error, Debug)]
pub enum EpisodeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Top-level errors for publishing runs
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Episode {uid} failed: {source}")]
    Episode {
        uid: u64,
        #[source]
        source: EpisodeError,
    },

    #[error("All selected episodes failed")]
    AllEpisodesFailed,
}
